//! Store adapter: typed operations over the external key/value store.
//!
//! The scheduler only needs a handful of semantic primitives — string
//! keys, sets, lists, and a sorted-by-external-key read. `MemoryStore`
//! backs tests and development; `RedisStore` (behind the `redis` feature)
//! is the production backend.
//!
//! The contract the scheduler relies on: `del` and `srem` report whether
//! the key/member existed, and each single-key operation is atomic. That
//! is what makes a claim on a task id win-or-lose cleanly across
//! concurrent scheduler instances.

use thiserror::Error;

pub mod memory;

#[cfg(feature = "redis")]
pub mod redis_store;

pub use memory::MemoryStore;

#[cfg(feature = "redis")]
pub use redis_store::RedisStore;

/// Store failure.
#[derive(Debug, Error, Clone)]
pub enum StoreError {
    /// The store could not be reached (connection refused, timeout).
    #[error("store connection error: {0}")]
    Connection(String),

    /// A command was rejected or returned an unexpected shape.
    #[error("store command error: {0}")]
    Command(String),
}

/// Typed operations over the external store.
pub trait TaskStore: Send + Sync {
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Delete a key. Returns whether it existed.
    fn del(&self, key: &str) -> Result<bool, StoreError>;

    /// Add a member to a set. Returns whether it was newly added.
    fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError>;

    /// Remove a member from a set. Returns whether it was present.
    fn srem(&self, key: &str, member: &str) -> Result<bool, StoreError>;

    fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Members of `key` sorted ascending by the numeric value stored at
    /// the key obtained by substituting each member into `by_pattern`
    /// (`*` placeholder). Members whose lookup key is missing weigh 0 and
    /// therefore sort first.
    fn sort_by(
        &self,
        key: &str,
        by_pattern: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<String>, StoreError>;

    /// Append to the tail of a list.
    fn rpush(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Pop from the head of a list.
    fn lpop(&self, key: &str) -> Result<Option<String>, StoreError>;
}
