//! # meterlog-storage
//!
//! Storage layer for meterlog.
//!
//! This crate provides:
//! - Persistence of history-log instances across a simulated power cycle
//! - Checksummed snapshot files with an on-disk index

pub mod error;
pub mod snapshot;

pub use error::StorageError;
pub use snapshot::{LogSnapshot, SnapshotMeta, SnapshotStore};
