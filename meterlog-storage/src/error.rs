//! Storage error types.

use thiserror::Error;

/// Errors from the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("snapshot not found: {0}")]
    SnapshotNotFound(String),

    #[error("data corruption: {0}")]
    Corruption(String),

    #[error("core error: {0}")]
    Core(#[from] meterlog_core::CoreError),
}

impl StorageError {
    /// I/O failures may succeed on a second attempt; everything else is permanent.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Io(_))
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            StorageError::Io(_) => "IO",
            StorageError::Json(_) => "JSON",
            StorageError::SnapshotNotFound(_) => "SNAPSHOT_NOT_FOUND",
            StorageError::Corruption(_) => "CORRUPTION",
            StorageError::Core(e) => e.error_code(),
        }
    }
}
