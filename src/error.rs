//! Error types for the outbox
//!
//! Each concern has its own enum:
//!
//! | Error | Raised by | Effect |
//! |-------|-----------|--------|
//! | [`StoreError`] | put / enumerate / delete | operation aborted, store keeps durable state |
//! | [`IngestionError`] | the ingestion collaborator | batch retained, retried on a later flush |
//! | [`BatchError`] | the public `BatchManager` API | returned to the caller |
//!
//! An empty flush is not an error; it is reported as
//! `FlushOutcome::Skipped { reason: SkipReason::Empty }`.

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for `BatchManager` operations
pub type BatchResult<T> = Result<T, BatchError>;

/// Errors raised by a durable store backend
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Atomic write failed: {0}")]
    Atomic(#[from] crate::utils::AtomicError),

    #[error("Store worker failed: {0}")]
    Worker(String),

    /// Injected or backend-specific failure
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Errors reported by the ingestion collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestionError {
    /// The transport could not complete the call
    #[error("Transport error: {0}")]
    Transport(String),

    /// The collaborator gave up waiting for the remote side
    #[error("Ingestion timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The remote side answered but did not acknowledge the batch
    #[error("Batch rejected: {0}")]
    Rejected(String),

    /// The ingestion task panicked or was cancelled
    #[error("Ingestion task aborted: {0}")]
    Aborted(String),
}

/// Errors returned by the public batching API
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Payload could not be serialized: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The controller task has stopped
    #[error("Batch controller is shut down")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_store_error_from_io() {
        let err: StoreError = std::io::Error::new(std::io::ErrorKind::Other, "disk full").into();
        assert_eq!(err.to_string(), "IO error: disk full");

        let batch_err: BatchError = err.into();
        assert!(matches!(batch_err, BatchError::Store(StoreError::Io(_))));
    }

    #[test]
    fn test_ingestion_error_display() {
        let err = IngestionError::Timeout(Duration::from_secs(5));
        assert_eq!(err.to_string(), "Ingestion timed out after 5s");

        let err = IngestionError::Rejected("status 500".to_string());
        assert_eq!(err.to_string(), "Batch rejected: status 500");
    }
}
