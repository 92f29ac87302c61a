//! Key scheme for persisted records.
//!
//! One authoritative layout: separate time/task keys plus an
//! externally-keyed sort over the pending index. Never mixed with other
//! historical layouts (composite "time:id" members, etc.).

/// Builds every store key under a single namespace prefix.
#[derive(Debug, Clone)]
pub(crate) struct KeySpace {
    namespace: String,
}

impl KeySpace {
    pub(crate) fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// Set of pending task ids.
    pub(crate) fn pending(&self) -> String {
        format!("{}:pending", self.namespace)
    }

    /// Payload record of one task.
    pub(crate) fn task(&self, id: &str) -> String {
        format!("{}:task:{}", self.namespace, id)
    }

    /// Time record (unix seconds) of one task.
    pub(crate) fn delay(&self, id: &str) -> String {
        format!("{}:delay:{}", self.namespace, id)
    }

    /// Lookup pattern handed to the store's externally-keyed sort.
    pub(crate) fn delay_pattern(&self) -> String {
        format!("{}:delay:*", self.namespace)
    }

    /// Live queue list for a destination queue.
    pub(crate) fn queue(&self, name: &str) -> String {
        format!("{}:queue:{}", self.namespace, name)
    }

    /// Fingerprints of jobs currently sitting in a live queue (dedup).
    pub(crate) fn queue_fingerprints(&self, name: &str) -> String {
        format!("{}:queue:{}:fp", self.namespace, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced() {
        let keys = KeySpace::new("app");
        assert_eq!(keys.pending(), "app:pending");
        assert_eq!(keys.task("abc"), "app:task:abc");
        assert_eq!(keys.delay("abc"), "app:delay:abc");
        assert_eq!(keys.delay_pattern(), "app:delay:*");
        assert_eq!(keys.queue("mail"), "app:queue:mail");
        assert_eq!(keys.queue_fingerprints("mail"), "app:queue:mail:fp");
    }

    #[test]
    fn delay_pattern_substitutes_to_delay_key() {
        let keys = KeySpace::new("app");
        assert_eq!(keys.delay_pattern().replacen('*', "abc", 1), keys.delay("abc"));
    }
}
