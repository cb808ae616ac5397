//! Simulation configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via METERLOG_CONFIG)
//! 3. Environment variables

use chrono::{NaiveDate, NaiveDateTime};
use meterlog_codec::{IntervalPolicy, SelectorMask, DEFAULT_CAPACITY};
use meterlog_core::LogConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Clock format used in config files and environment variables.
pub const CLOCK_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// meterlog configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log configuration applied on enable.
    pub log: LogDefaults,
    /// Simulated meter settings.
    pub simulation: SimulationConfig,
    /// Persistence of log state across resets.
    pub storage: StorageConfig,
}

impl Config {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("METERLOG_CONFIG") {
            config = Self::from_file(&path)?;
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        self.log.apply_env_overrides();
        self.simulation.apply_env_overrides();
        self.storage.apply_env_overrides();
    }

    /// Checks values that serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.log.to_log_config()?;
        self.simulation.start()?;
        Ok(())
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Ok(())
    }
}

/// Log configuration applied when a log is enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogDefaults {
    /// Maximum number of entries.
    pub capacity: u16,
    /// Interval name, e.g. `daily`, `hourly`, `weekly_monday`.
    pub interval: String,
    /// Field names of the dataset, or `ALL`.
    pub dataset: Vec<String>,
}

impl Default for LogDefaults {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            interval: IntervalPolicy::Daily.to_string(),
            dataset: vec![meterlog_codec::ALL_FIELDS_NAME.to_string()],
        }
    }
}

impl LogDefaults {
    fn apply_env_overrides(&mut self) {
        if let Ok(capacity) = std::env::var("METERLOG_CAPACITY") {
            if let Ok(n) = capacity.parse() {
                self.capacity = n;
            }
        }

        if let Ok(interval) = std::env::var("METERLOG_INTERVAL") {
            self.interval = interval;
        }

        if let Ok(dataset) = std::env::var("METERLOG_DATASET") {
            self.dataset = dataset
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
    }

    /// Resolves names into a typed log configuration.
    pub fn to_log_config(&self) -> Result<LogConfig, ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ValidationError(
                "log.capacity must be at least 1".to_string(),
            ));
        }
        let interval: IntervalPolicy = self
            .interval
            .parse()
            .map_err(|e| ConfigError::ValidationError(format!("log.interval: {}", e)))?;
        let selector = SelectorMask::encode(&self.dataset)
            .map_err(|e| ConfigError::ValidationError(format!("log.dataset: {}", e)))?;
        Ok(LogConfig {
            capacity: self.capacity,
            interval,
            selector,
        })
    }
}

/// Simulated meter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Initial RTC value, `YYYY-MM-DDTHH:MM:SS`.
    pub start_clock: String,
    /// Enable the primary log at startup.
    pub enable_on_start: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            start_clock: "2021-12-31T00:00:00".to_string(),
            enable_on_start: true,
        }
    }
}

impl SimulationConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(clock) = std::env::var("METERLOG_START_CLOCK") {
            self.start_clock = clock;
        }

        if let Ok(enable) = std::env::var("METERLOG_ENABLE_ON_START") {
            self.enable_on_start = enable == "1" || enable.to_lowercase() == "true";
        }
    }

    /// Parsed start clock.
    pub fn start(&self) -> Result<NaiveDateTime, ConfigError> {
        let clock = NaiveDateTime::parse_from_str(&self.start_clock, CLOCK_FORMAT).map_err(|e| {
            ConfigError::ValidationError(format!(
                "simulation.start_clock '{}': {}",
                self.start_clock, e
            ))
        })?;
        let first = NaiveDate::from_ymd_opt(2000, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0));
        let last = NaiveDate::from_ymd_opt(2099, 12, 31).and_then(|d| d.and_hms_opt(23, 59, 59));
        match (first, last) {
            (Some(first), Some(last)) if clock >= first && clock <= last => Ok(clock),
            _ => Err(ConfigError::ValidationError(format!(
                "simulation.start_clock '{}' outside 2000..=2099",
                self.start_clock
            ))),
        }
    }
}

/// Persistence configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Snapshot directory. Without it log state lives in memory only.
    pub data_dir: Option<PathBuf>,
}

impl StorageConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("METERLOG_DATA_DIR") {
            self.data_dir = if dir.is_empty() {
                None
            } else {
                Some(PathBuf::from(dir))
            };
        }
    }

    /// Returns the snapshot directory.
    pub fn snapshots_dir(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join("snapshots"))
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
