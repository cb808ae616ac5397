//! Device error types.

use crate::command::CiStatus;
use crate::config::ConfigError;
use meterlog_codec::CodecError;
use meterlog_core::CoreError;
use meterlog_storage::StorageError;
use thiserror::Error;

/// Errors from talking to a meter.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("communication failure: {0}")]
    Communication(String),

    #[error("device rejected {command}: {status}")]
    CiField { command: String, status: CiStatus },

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("response to {command} lacks field '{field}'")]
    MissingField { command: String, field: String },

    #[error("malformed '{field}' in response to {command}: {reason}")]
    MalformedResponse {
        command: String,
        field: String,
        reason: String,
    },

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("model error: {0}")]
    Core(#[from] CoreError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl DeviceError {
    /// Returns whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            DeviceError::Communication(_) => true,
            DeviceError::Storage(e) => e.is_retryable(),
            _ => false,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            DeviceError::Communication(_) => "COMMUNICATION",
            DeviceError::CiField { .. } => "CI_FIELD",
            DeviceError::UnknownCommand(_) => "UNKNOWN_COMMAND",
            DeviceError::MissingField { .. } => "MISSING_FIELD",
            DeviceError::MalformedResponse { .. } => "MALFORMED_RESPONSE",
            DeviceError::Codec(e) => e.error_code(),
            DeviceError::Core(e) => e.error_code(),
            DeviceError::Storage(e) => e.error_code(),
            DeviceError::Config(_) => "CONFIG",
        }
    }
}
