//! Delayed task scheduling with bounded, backed-off retries.
//!
//! ## Design
//!
//! - `enqueue_at` turns "run this at time T" into durable store records
//! - a poll loop releases due tasks into live queues within a tunable
//!   slack window, with crash-orphan reconciliation at startup
//! - the retry engine re-uses the scheduler to escalate failed
//!   executions (`attempts⁴ + 5` seconds of backoff) until the attempt
//!   ceiling, then hands the job to a pluggable terminal failure sink
//! - at-least-once delivery; at-most-one dispatch per task id even with
//!   concurrent scheduler instances
//!
//! ## Components
//!
//! - `DelayedScheduler`: registration, polling, reconciliation
//! - `RetryEngine`: failure escalation and give-up
//! - `FailureReporter`: terminal sink for exhausted jobs
//! - `Worker` / `HandlerRegistry`: live-queue consumption and job-class
//!   resolution

pub mod config;
pub mod error;
mod keys;
pub mod reporter;
pub mod retry;
pub mod scheduler;
pub mod worker;

pub use config::{RetryConfig, SchedulerConfig};
pub use error::{SchedulerError, SchedulerResult};
pub use reporter::{FailureReport, FailureReporter, LogReporter, MemoryReporter};
pub use retry::{Disposition, RetryEngine};
pub use scheduler::{DelayedScheduler, SchedulerHandle};
pub use worker::{HandlerRegistry, Worker, WorkerHandle};
