//! Error types for taskpull
//!
//! Two typed families cover the library boundary:
//! - `TransportError`: anything that goes wrong between a worker and the
//!   coordinator. Fatal to the worker loop that hit it.
//! - `CoordinatorError`: misuse of the coordinator's local API.
//!
//! Computation failures are not errors at this level. They are captured
//! inside the task as a failure outcome and reported to the provider.
//! Application code (CLI, configuration, output) uses `anyhow`.

use crate::task::TaskId;
use thiserror::Error;

/// Errors raised while talking to the coordinator
#[derive(Error, Debug)]
pub enum TransportError {
    /// Could not open a connection
    #[error("Failed to connect to coordinator at '{addr}': {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Socket read/write failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the connection
    #[error("Connection closed by peer")]
    Closed,

    /// Message could not be serialized
    #[error("Failed to encode message: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// Message could not be deserialized
    #[error("Failed to decode message: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// Length prefix exceeds the frame limit
    #[error("Message too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// Coordinator and worker disagree on the protocol
    #[error("Protocol version mismatch: coordinator={coordinator}, worker={worker}")]
    VersionMismatch { coordinator: u32, worker: u32 },

    /// A response arrived that does not answer the request
    #[error("Unexpected message: expected {expected}, got {got}")]
    Unexpected { expected: &'static str, got: String },

    /// The coordinator answered with an error message
    #[error("Coordinator rejected request: {0}")]
    Rejected(String),

    /// The task handed to `finish` cannot be reported
    #[error(transparent)]
    Report(#[from] CoordinatorError),
}

/// Errors raised by the coordinator's local API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    /// `finish` was called with a task that was never run
    #[error("Task {0} has no outcome; run it before reporting completion")]
    OutcomeUnset(TaskId),
}

/// Result type for transport operations
pub type TransportResult<T> = std::result::Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_mismatch_message() {
        let err = TransportError::VersionMismatch { coordinator: 1, worker: 2 };
        assert_eq!(
            err.to_string(),
            "Protocol version mismatch: coordinator=1, worker=2"
        );
    }

    #[test]
    fn test_report_error_is_transparent() {
        let id = TaskId::generate();
        let err: TransportError = CoordinatorError::OutcomeUnset(id).into();
        assert!(err.to_string().contains(&id.to_string()));
    }
}
