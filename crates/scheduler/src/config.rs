//! Configuration objects.
//!
//! Everything is an explicit struct injected into constructors; there is
//! no process-global configuration. The daemon and embedded workers read
//! overrides from `DEFERQ_*` environment variables through the
//! `from_env` constructors; invalid values warn and keep the default.

use std::time::Duration;

use tracing::warn;

/// Tunables for the delayed task scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Key namespace prefix for every record this scheduler touches.
    pub namespace: String,
    /// Tolerance added to "now" when deciding whether a task is due.
    /// Also drives the inter-poll sleep (`2 × fuzziness`).
    pub fuzziness: Duration,
    /// Maximum pending ids fetched per poll.
    pub batch_size: usize,
    /// When set, dispatch suppresses live-queue pushes whose fingerprint
    /// is already enqueued (genuine dedup, not a no-op flag).
    pub dedup_dispatch: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            namespace: "deferq".to_string(),
            fuzziness: Duration::from_secs(5),
            batch_size: 10,
            dedup_dispatch: false,
        }
    }
}

impl SchedulerConfig {
    /// Defaults overridden by `DEFERQ_NAMESPACE`, `DEFERQ_FUZZINESS_SECS`
    /// and `DEFERQ_BATCH_SIZE`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("DEFERQ_NAMESPACE") {
            config.namespace = value;
        }

        if let Ok(value) = std::env::var("DEFERQ_FUZZINESS_SECS") {
            match value.parse::<u64>() {
                Ok(secs) => config.fuzziness = Duration::from_secs(secs),
                Err(_) => warn!(value = %value, "ignoring invalid DEFERQ_FUZZINESS_SECS"),
            }
        }

        if let Ok(value) = std::env::var("DEFERQ_BATCH_SIZE") {
            match value.parse::<usize>() {
                Ok(size) if size > 0 => config.batch_size = size,
                _ => warn!(value = %value, "ignoring invalid DEFERQ_BATCH_SIZE"),
            }
        }

        config
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_fuzziness(mut self, fuzziness: Duration) -> Self {
        self.fuzziness = fuzziness;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_dedup_dispatch(mut self, dedup: bool) -> Self {
        self.dedup_dispatch = dedup;
        self
    }
}

/// Tunables for the retry escalation engine.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Ceiling on total attempts before a job is handed to the terminal
    /// failure reporter.
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 10 }
    }
}

impl RetryConfig {
    /// Default ceiling overridden by `DEFERQ_MAX_ATTEMPTS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("DEFERQ_MAX_ATTEMPTS") {
            match value.parse::<u32>() {
                Ok(max) if max > 0 => config.max_attempts = max,
                _ => warn!(value = %value, "ignoring invalid DEFERQ_MAX_ATTEMPTS"),
            }
        }

        config
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_tunables() {
        let scheduler = SchedulerConfig::default();
        assert_eq!(scheduler.fuzziness, Duration::from_secs(5));
        assert_eq!(scheduler.batch_size, 10);
        assert!(!scheduler.dedup_dispatch);

        assert_eq!(RetryConfig::default().max_attempts, 10);
    }

    // Single test so the process-global environment is not mutated from
    // concurrently running tests.
    #[test]
    fn env_overrides_are_applied_and_invalid_values_keep_defaults() {
        unsafe {
            std::env::set_var("DEFERQ_NAMESPACE", "deferq-test");
            std::env::set_var("DEFERQ_FUZZINESS_SECS", "9");
            std::env::set_var("DEFERQ_BATCH_SIZE", "25");
            std::env::set_var("DEFERQ_MAX_ATTEMPTS", "4");
        }

        let scheduler = SchedulerConfig::from_env();
        assert_eq!(scheduler.namespace, "deferq-test");
        assert_eq!(scheduler.fuzziness, Duration::from_secs(9));
        assert_eq!(scheduler.batch_size, 25);
        assert_eq!(RetryConfig::from_env().max_attempts, 4);

        unsafe {
            std::env::set_var("DEFERQ_FUZZINESS_SECS", "soon");
            std::env::set_var("DEFERQ_BATCH_SIZE", "0");
            std::env::set_var("DEFERQ_MAX_ATTEMPTS", "0");
        }

        let scheduler = SchedulerConfig::from_env();
        assert_eq!(scheduler.fuzziness, Duration::from_secs(5));
        assert_eq!(scheduler.batch_size, 10);
        assert_eq!(RetryConfig::from_env().max_attempts, 10);

        unsafe {
            std::env::remove_var("DEFERQ_NAMESPACE");
            std::env::remove_var("DEFERQ_FUZZINESS_SECS");
            std::env::remove_var("DEFERQ_BATCH_SIZE");
            std::env::remove_var("DEFERQ_MAX_ATTEMPTS");
        }
    }
}
