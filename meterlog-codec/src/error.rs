//! Codec error types.

use crate::catalog::Field;
use thiserror::Error;

/// Errors raised while encoding or decoding history-log data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("unknown field name: '{name}'")]
    UnknownField { name: String },

    #[error("no field is assigned to selector bit {bit:#06x}")]
    UnknownFieldBit { bit: u16 },

    #[error("invalid selector mask {mask:#06x}: undefined bits {undefined:#06x}")]
    InvalidMask { mask: u16, undefined: u16 },

    #[error("entry length mismatch: layout expects {expected} bytes, got {actual}")]
    LayoutMismatch { expected: usize, actual: usize },

    #[error("{field} out of range: {reason}")]
    TimestampRange { field: Field, reason: String },

    #[error("unknown interval selector code: {0:#06x}")]
    UnknownInterval(u16),

    #[error("invalid weekday index {dow}: must be 0 (Sunday) to 6 (Saturday)")]
    InvalidWeekday { dow: u8 },

    #[error("unknown interval name: '{name}'")]
    UnknownIntervalName { name: String },

    #[error("truncated {what}: need {needed} bytes, got {actual}")]
    Truncated {
        what: &'static str,
        needed: usize,
        actual: usize,
    },
}

impl CodecError {
    /// Returns a stable error code for reports and CLI output.
    pub fn error_code(&self) -> &'static str {
        match self {
            CodecError::UnknownField { .. } | CodecError::UnknownFieldBit { .. } => {
                "UNKNOWN_FIELD"
            }
            CodecError::InvalidMask { .. } => "INVALID_MASK",
            CodecError::LayoutMismatch { .. } => "LAYOUT_MISMATCH",
            CodecError::TimestampRange { .. } => "TIMESTAMP_RANGE",
            CodecError::UnknownInterval(_)
            | CodecError::UnknownIntervalName { .. }
            | CodecError::InvalidWeekday { .. } => {
                "UNKNOWN_INTERVAL"
            }
            CodecError::Truncated { .. } => "TRUNCATED",
        }
    }
}
