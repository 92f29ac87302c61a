//! In-memory store for tests and development.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, RwLock};

use crate::{StoreError, TaskStore};

#[derive(Debug, Default)]
struct Shelves {
    strings: HashMap<String, String>,
    sets: HashMap<String, HashSet<String>>,
    lists: HashMap<String, VecDeque<String>>,
}

/// Process-local `TaskStore`.
///
/// Clones share the same underlying data, so several schedulers and
/// workers can run against one instance the way they would against one
/// Redis server.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Shelves>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskStore for MemoryStore {
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut shelves = self.inner.write().unwrap();
        shelves.strings.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let shelves = self.inner.read().unwrap();
        Ok(shelves.strings.get(key).cloned())
    }

    fn del(&self, key: &str) -> Result<bool, StoreError> {
        let mut shelves = self.inner.write().unwrap();
        Ok(shelves.strings.remove(key).is_some())
    }

    fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut shelves = self.inner.write().unwrap();
        Ok(shelves
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string()))
    }

    fn srem(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut shelves = self.inner.write().unwrap();
        Ok(shelves
            .sets
            .get_mut(key)
            .is_some_and(|set| set.remove(member)))
    }

    fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let shelves = self.inner.read().unwrap();
        Ok(shelves
            .sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn sort_by(
        &self,
        key: &str,
        by_pattern: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<String>, StoreError> {
        let shelves = self.inner.read().unwrap();
        let Some(set) = shelves.sets.get(key) else {
            return Ok(Vec::new());
        };

        let mut weighted: Vec<(i64, String)> = set
            .iter()
            .map(|member| {
                let lookup = by_pattern.replacen('*', member, 1);
                let weight = shelves
                    .strings
                    .get(&lookup)
                    .and_then(|v| v.parse::<i64>().ok())
                    .unwrap_or(0);
                (weight, member.clone())
            })
            .collect();

        // Member as secondary key keeps equal weights deterministic.
        weighted.sort();

        Ok(weighted
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(_, member)| member)
            .collect())
    }

    fn rpush(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut shelves = self.inner.write().unwrap();
        shelves
            .lists
            .entry(key.to_string())
            .or_default()
            .push_back(value.to_string());
        Ok(())
    }

    fn lpop(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut shelves = self.inner.write().unwrap();
        Ok(shelves.lists.get_mut(key).and_then(|list| list.pop_front()))
    }
}
