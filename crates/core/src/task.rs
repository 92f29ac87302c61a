//! Delayed task records and content-hash identity.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::error::{CoreError, CoreResult};
use crate::job::JobDescriptor;

/// Deterministic identity of a registered delayed task.
///
/// Derived as the SHA-256 of the canonical JSON of
/// `{job, queue, run_at}`, so re-registering an identical tuple yields
/// the same id and simply overwrites the existing records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn derive(queue: &str, job: &JobDescriptor, run_at: i64) -> CoreResult<Self> {
        let canonical = serde_json::to_string(&json!({
            "job": job,
            "queue": queue,
            "run_at": run_at,
        }))
        .map_err(|e| CoreError::Encode(e.to_string()))?;

        Ok(Self(hex_sha256(canonical.as_bytes())))
    }

    /// Wrap an id read back from the store.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A unit of work registered to run no earlier than `run_at`.
///
/// Persisted as the payload record of a pending task; the scheduler keeps
/// the time record separately so the store can sort ids by it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayedTask {
    pub queue: String,
    /// Unix seconds.
    pub run_at: i64,
    pub job: JobDescriptor,
}

impl DelayedTask {
    pub fn new(queue: impl Into<String>, run_at: DateTime<Utc>, job: JobDescriptor) -> Self {
        Self {
            queue: queue.into(),
            run_at: run_at.timestamp(),
            job,
        }
    }

    pub fn id(&self) -> CoreResult<TaskId> {
        TaskId::derive(&self.queue, &self.job, self.run_at)
    }

    pub fn encode(&self) -> CoreResult<String> {
        serde_json::to_string(self).map_err(|e| CoreError::Encode(e.to_string()))
    }

    pub fn decode(raw: &str) -> CoreResult<Self> {
        serde_json::from_str(raw).map_err(|e| CoreError::Decode(e.to_string()))
    }
}

pub(crate) fn hex_sha256(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn job() -> JobDescriptor {
        JobDescriptor::plain("invoice.send", vec![json!("inv-9")])
    }

    #[test]
    fn identical_tuples_share_an_id() {
        let a = TaskId::derive("billing", &job(), 1_700_000_000).unwrap();
        let b = TaskId::derive("billing", &job(), 1_700_000_000).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn id_changes_with_any_component() {
        let base = TaskId::derive("billing", &job(), 1_700_000_000).unwrap();

        assert_ne!(base, TaskId::derive("mail", &job(), 1_700_000_000).unwrap());
        assert_ne!(base, TaskId::derive("billing", &job(), 1_700_000_001).unwrap());

        let other = JobDescriptor::plain("invoice.send", vec![json!("inv-10")]);
        assert_ne!(base, TaskId::derive("billing", &other, 1_700_000_000).unwrap());
    }

    #[test]
    fn id_is_lowercase_hex() {
        let id = TaskId::derive("q", &job(), 0).unwrap();
        assert_eq!(id.as_str().len(), 64);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn task_record_roundtrips() {
        let task = DelayedTask::new("billing", Utc::now(), job());
        let decoded = DelayedTask::decode(&task.encode().unwrap()).unwrap();
        assert_eq!(task, decoded);
    }

    #[test]
    fn attempt_counter_changes_the_id() {
        // A retry envelope with a bumped counter must never collide with
        // the previous attempt's records.
        let first = JobDescriptor::retry(1, job());
        let second = JobDescriptor::retry(2, job());

        let a = TaskId::derive("billing", &first, 1_700_000_000).unwrap();
        let b = TaskId::derive("billing", &second, 1_700_000_000).unwrap();
        assert_ne!(a, b);
    }
}
