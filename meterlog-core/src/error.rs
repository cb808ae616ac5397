//! Core error types.

use meterlog_codec::CodecError;
use thiserror::Error;

/// Errors from the log store model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("history log is disabled")]
    LogDisabled,

    #[error("log index {index} out of range: log holds {count} entries")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("invalid log capacity: {capacity} (must be at least 1)")]
    InvalidCapacity { capacity: u32 },

    #[error("invalid log state: {reason}")]
    InvalidState { reason: String },

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

impl CoreError {
    /// Model errors are deterministic and never retryable.
    pub fn is_retryable(&self) -> bool {
        false
    }

    /// Returns a stable error code for reports.
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::LogDisabled => "LOG_DISABLED",
            CoreError::IndexOutOfRange { .. } => "INDEX_OUT_OF_RANGE",
            CoreError::InvalidCapacity { .. } => "INVALID_CAPACITY",
            CoreError::InvalidState { .. } => "INVALID_STATE",
            CoreError::Codec(e) => e.error_code(),
        }
    }
}
