//! Scheduler-layer errors.

use thiserror::Error;

use deferq_core::CoreError;
use deferq_store::StoreError;

use crate::reporter::ReporterError;

/// Result type for scheduler and retry-engine operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Bad configuration detected before any store write (e.g. an
    /// unresolvable destination queue).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The store rejected or could not complete an operation. These are
    /// transient from the run loop's point of view: pending tasks stay
    /// durable, the next cycle retries.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A payload failed to encode or decode.
    #[error("codec error: {0}")]
    Codec(#[from] CoreError),

    /// The terminal failure sink refused a report.
    #[error("reporter error: {0}")]
    Reporter(#[from] ReporterError),
}
