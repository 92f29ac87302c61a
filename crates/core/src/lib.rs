//! Domain model for deferred background work.
//!
//! ## Components
//!
//! - `JobDescriptor`: language-neutral description of a unit of work
//! - `RetryEnvelope`: a job wrapped with its retry-attempt counter
//! - `DelayedTask`: a job registered to run no earlier than a given time
//! - `TaskId`: deterministic content-hash identity of a delayed task
//!
//! Everything here serializes to plain JSON so that producers and workers
//! written in other languages can share the same store records.

pub mod error;
pub mod job;
pub mod task;

pub use error::{CoreError, CoreResult};
pub use job::{JobDescriptor, PlainJob, RetryEnvelope};
pub use task::{DelayedTask, TaskId};
