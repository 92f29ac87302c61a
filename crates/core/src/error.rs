//! Error model for the domain layer.

use thiserror::Error;

/// Result type used across the domain layer.
pub type CoreResult<T> = Result<T, CoreError>;

/// Deterministic encode/decode failures.
///
/// Store and scheduling concerns live in their own crates; this stays
/// focused on the wire format of job payloads.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A payload could not be serialized.
    #[error("encode failed: {0}")]
    Encode(String),

    /// A stored payload could not be decoded back into a job.
    #[error("undecodable payload: {0}")]
    Decode(String),
}
