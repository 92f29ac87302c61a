//! Redis-backed `TaskStore`.
//!
//! Uses the synchronous `redis` client; every operation opens its
//! connection through the shared client, so the store itself is cheap to
//! clone across scheduler and worker threads.

use std::sync::Arc;

use crate::{StoreError, TaskStore};

#[derive(Debug, Clone)]
pub struct RedisStore {
    client: Arc<redis::Client>,
}

impl RedisStore {
    /// Create a store from a connection URL (e.g. `redis://localhost:6379`).
    ///
    /// This only validates the URL; use [`RedisStore::ping`] to verify the
    /// server is actually reachable.
    pub fn new(url: impl AsRef<str>) -> Result<Self, StoreError> {
        let client = redis::Client::open(url.as_ref())
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(Self {
            client: Arc::new(client),
        })
    }

    /// Round-trip a PING to confirm the server is reachable.
    pub fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let _: String = redis::cmd("PING")
            .query(&mut conn)
            .map_err(|e| StoreError::Command(format!("PING failed: {e}")))?;
        Ok(())
    }

    fn conn(&self) -> Result<redis::Connection, StoreError> {
        self.client
            .get_connection()
            .map_err(|e| StoreError::Connection(e.to_string()))
    }
}

impl TaskStore for RedisStore {
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .query(&mut conn)
            .map_err(|e| StoreError::Command(format!("SET failed: {e}")))?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn()?;
        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query(&mut conn)
            .map_err(|e| StoreError::Command(format!("GET failed: {e}")))?;
        Ok(value)
    }

    fn del(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn()?;
        let removed: u64 = redis::cmd("DEL")
            .arg(key)
            .query(&mut conn)
            .map_err(|e| StoreError::Command(format!("DEL failed: {e}")))?;
        Ok(removed > 0)
    }

    fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn()?;
        let added: u64 = redis::cmd("SADD")
            .arg(key)
            .arg(member)
            .query(&mut conn)
            .map_err(|e| StoreError::Command(format!("SADD failed: {e}")))?;
        Ok(added > 0)
    }

    fn srem(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn()?;
        let removed: u64 = redis::cmd("SREM")
            .arg(key)
            .arg(member)
            .query(&mut conn)
            .map_err(|e| StoreError::Command(format!("SREM failed: {e}")))?;
        Ok(removed > 0)
    }

    fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn()?;
        let members: Vec<String> = redis::cmd("SMEMBERS")
            .arg(key)
            .query(&mut conn)
            .map_err(|e| StoreError::Command(format!("SMEMBERS failed: {e}")))?;
        Ok(members)
    }

    fn sort_by(
        &self,
        key: &str,
        by_pattern: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn()?;
        // SORT ... BY pattern LIMIT offset count; numeric sort, missing
        // weight keys sort first.
        let members: Vec<String> = redis::cmd("SORT")
            .arg(key)
            .arg("BY")
            .arg(by_pattern)
            .arg("LIMIT")
            .arg(offset)
            .arg(limit)
            .query(&mut conn)
            .map_err(|e| StoreError::Command(format!("SORT failed: {e}")))?;
        Ok(members)
    }

    fn rpush(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let _: u64 = redis::cmd("RPUSH")
            .arg(key)
            .arg(value)
            .query(&mut conn)
            .map_err(|e| StoreError::Command(format!("RPUSH failed: {e}")))?;
        Ok(())
    }

    fn lpop(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn()?;
        let value: Option<String> = redis::cmd("LPOP")
            .arg(key)
            .query(&mut conn)
            .map_err(|e| StoreError::Command(format!("LPOP failed: {e}")))?;
        Ok(value)
    }
}
