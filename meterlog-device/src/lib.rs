//! # meterlog-device
//!
//! Device side of meterlog.
//!
//! This crate provides:
//! - The blocking command channel to a meter
//! - A history-log client that mirrors every command into a reference model
//! - An in-process simulated meter with two log instances
//! - YAML and environment configuration

pub mod client;
pub mod command;
pub mod config;
pub mod error;
pub mod sim;

pub use client::{Divergence, HistoryLogClient, VerifyReport};
pub use command::{fields, CiStatus, Command, CommandChannel, InstanceId, ResponseFields};
pub use config::{Config, ConfigError, LogDefaults, SimulationConfig, StorageConfig};
pub use error::DeviceError;
pub use sim::SimulatedMeter;
