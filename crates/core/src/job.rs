//! Job descriptors and the retry envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, CoreResult};
use crate::task::hex_sha256;

/// A unit of work as it travels through the store.
///
/// Encodes as plain JSON with string keys: a plain job is
/// `{"class": "...", "args": [...]}`, a retry envelope is
/// `{"attempts": n, "job": {...}}` with the wrapped job nested inside.
/// The untagged representation keeps the format language-neutral.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobDescriptor {
    Retry(RetryEnvelope),
    Plain(PlainJob),
}

/// A job-type identifier plus its arguments.
///
/// `class` is resolved to a handler through an explicit registry at
/// execution time; nothing here assumes a particular runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlainJob {
    pub class: String,
    pub args: Vec<Value>,
}

/// A job descriptor wrapping another descriptor plus a retry counter.
///
/// `attempts` starts at 1 on the first failure and increments by exactly
/// one per escalation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryEnvelope {
    pub attempts: u32,
    pub job: Box<JobDescriptor>,
}

impl JobDescriptor {
    pub fn plain(class: impl Into<String>, args: Vec<Value>) -> Self {
        Self::Plain(PlainJob {
            class: class.into(),
            args,
        })
    }

    pub fn retry(attempts: u32, job: JobDescriptor) -> Self {
        Self::Retry(RetryEnvelope {
            attempts,
            job: Box::new(job),
        })
    }

    /// Peel off every retry envelope and return the executable job.
    pub fn innermost(&self) -> &PlainJob {
        match self {
            JobDescriptor::Retry(envelope) => envelope.job.innermost(),
            JobDescriptor::Plain(plain) => plain,
        }
    }

    pub fn encode(&self) -> CoreResult<String> {
        serde_json::to_string(self).map_err(|e| CoreError::Encode(e.to_string()))
    }

    pub fn decode(raw: &str) -> CoreResult<Self> {
        serde_json::from_str(raw).map_err(|e| CoreError::Decode(e.to_string()))
    }

    /// Content fingerprint of the encoded job, used for dedup enqueue.
    pub fn fingerprint(&self) -> CoreResult<String> {
        Ok(hex_sha256(self.encode()?.as_bytes()))
    }
}
