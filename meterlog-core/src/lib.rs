//! # meterlog-core
//!
//! Reference model of the meter's history log.
//!
//! This crate provides:
//! - The log instance state machine (enable, append, ring overwrite, delete)
//! - Interval boundaries for automatic entry generation
//! - The log info view reported by the meter

pub mod entry;
pub mod error;
pub mod info;
pub mod schedule;
pub mod store;

pub use entry::LogEntry;
pub use error::CoreError;
pub use info::{InstanceStatus, LogInfo};
pub use schedule::{crosses, next_boundary};
pub use store::{AppendOutcome, LogConfig, LogInstance, LogState};
