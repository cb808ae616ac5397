//! History log instance state machine.
//!
//! An instance is a ring buffer of fixed capacity. Entries are written at
//! `write_index`; once the buffer is full each append overwrites the oldest
//! entry. Logical index 0 is always the newest entry.

use crate::entry::LogEntry;
use crate::error::CoreError;
use crate::info::{InstanceStatus, LogInfo};
use crate::schedule;
use chrono::NaiveDateTime;
use meterlog_codec::{
    DecodedEntry, IntervalPolicy, MeasurementSnapshot, RecordLayout, SelectorMask,
    DEFAULT_CAPACITY,
};
use serde::{Deserialize, Serialize};

/// Configuration applied when a log is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Maximum number of stored entries.
    pub capacity: u16,

    /// Automatic generation schedule.
    pub interval: IntervalPolicy,

    /// Fields recorded in each entry.
    pub selector: SelectorMask,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            interval: IntervalPolicy::Daily,
            selector: SelectorMask::ALL,
        }
    }
}

/// Coarse lifecycle state of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogState {
    Disabled,
    Empty,
    Partial,
    Full,
}

/// Result of a successful append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AppendOutcome {
    /// Physical slot the entry was written to.
    pub slot: usize,

    /// An older entry was overwritten.
    pub overwritten: bool,

    /// This append switched the status to wrapped.
    pub wrapped_now: bool,
}

/// One history log instance.
///
/// Deserialization goes through [`LogInstanceData`] so a persisted instance
/// that breaks the ring invariants is rejected instead of loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LogInstanceData")]
pub struct LogInstance {
    config: LogConfig,
    enabled: bool,
    entries: Vec<LogEntry>,
    write_index: usize,
    status: InstanceStatus,
    /// Clock value seen by the previous tick.
    #[serde(skip_serializing_if = "Option::is_none")]
    last_tick: Option<NaiveDateTime>,
}

/// Unchecked wire form of [`LogInstance`].
#[derive(Deserialize)]
struct LogInstanceData {
    config: LogConfig,
    enabled: bool,
    entries: Vec<LogEntry>,
    write_index: usize,
    status: InstanceStatus,
    #[serde(default)]
    last_tick: Option<NaiveDateTime>,
}

impl TryFrom<LogInstanceData> for LogInstance {
    type Error = CoreError;

    fn try_from(data: LogInstanceData) -> Result<Self, Self::Error> {
        let instance = Self {
            config: data.config,
            enabled: data.enabled,
            entries: data.entries,
            write_index: data.write_index,
            status: data.status,
            last_tick: data.last_tick,
        };
        instance.validate()?;
        Ok(instance)
    }
}

impl Default for LogInstance {
    fn default() -> Self {
        Self::disabled(LogConfig::default())
    }
}

impl LogInstance {
    /// Creates a disabled instance carrying `config`.
    pub fn new(config: LogConfig) -> Result<Self, CoreError> {
        check_capacity(config.capacity)?;
        Ok(Self::disabled(config))
    }

    fn disabled(config: LogConfig) -> Self {
        Self {
            config,
            enabled: false,
            entries: Vec::new(),
            write_index: 0,
            status: InstanceStatus::Fresh,
            last_tick: None,
        }
    }

    /// Creates an enabled, empty instance.
    pub fn enabled(config: LogConfig) -> Result<Self, CoreError> {
        let mut instance = Self::new(config)?;
        instance.enable_with(config)?;
        Ok(instance)
    }

    /// Checks the ring invariants: capacity of at least 1, no more entries
    /// than capacity, a write index consistent with the fill level and every
    /// entry sized for its own selector.
    pub fn validate(&self) -> Result<(), CoreError> {
        check_capacity(self.config.capacity)?;
        let capacity = self.config.capacity as usize;
        let count = self.entries.len();
        let invalid = |reason: String| -> Result<(), CoreError> {
            Err(CoreError::InvalidState { reason })
        };

        if count > capacity {
            return invalid(format!("{} entries exceed capacity {}", count, capacity));
        }
        if self.write_index >= capacity {
            return invalid(format!(
                "write index {} outside capacity {}",
                self.write_index, capacity
            ));
        }
        if count < capacity && self.write_index != count {
            return invalid(format!(
                "write index {} does not follow {} entries",
                self.write_index, count
            ));
        }
        for (slot, entry) in self.entries.iter().enumerate() {
            entry
                .layout()
                .check_len(&entry.raw)
                .map_err(|e| CoreError::InvalidState {
                    reason: format!("entry in slot {}: {}", slot, e),
                })?;
        }
        Ok(())
    }

    /// Enables the log with a fresh configuration. Stored entries are dropped.
    pub fn enable(
        &mut self,
        capacity: u16,
        interval: IntervalPolicy,
        selector: SelectorMask,
    ) -> Result<(), CoreError> {
        self.enable_with(LogConfig {
            capacity,
            interval,
            selector,
        })
    }

    pub fn enable_with(&mut self, config: LogConfig) -> Result<(), CoreError> {
        check_capacity(config.capacity)?;
        self.config = config;
        self.enabled = true;
        self.clear();
        tracing::info!(
            capacity = config.capacity,
            interval = %config.interval,
            selector = %config.selector,
            "history log enabled"
        );
        Ok(())
    }

    /// Stops logging. Stored entries are kept.
    pub fn disable(&mut self) {
        self.enabled = false;
        tracing::info!(entries = self.entries.len(), "history log disabled");
    }

    /// Clears all entries and leaves the log enabled with its configuration.
    pub fn delete(&mut self) {
        self.enabled = true;
        self.clear();
        tracing::info!("history log deleted");
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.write_index = 0;
        self.status = InstanceStatus::Fresh;
    }

    /// Appends a raw entry recorded under the active selector.
    pub fn append(&mut self, raw: &[u8]) -> Result<AppendOutcome, CoreError> {
        if !self.enabled {
            return Err(CoreError::LogDisabled);
        }
        let entry = LogEntry::new(self.config.selector, raw)?;
        Ok(self.push(entry))
    }

    fn push(&mut self, entry: LogEntry) -> AppendOutcome {
        let capacity = self.config.capacity as usize;
        let slot = self.write_index;
        let mut outcome = AppendOutcome {
            slot,
            ..Default::default()
        };

        if self.entries.len() < capacity {
            self.entries.push(entry);
        } else {
            self.entries[slot] = entry;
            outcome.overwritten = true;
            if self.status == InstanceStatus::Fresh {
                self.status = InstanceStatus::Wrapped;
                outcome.wrapped_now = true;
                tracing::info!(capacity, "history log wrapped");
            }
        }
        self.write_index = (slot + 1) % capacity;

        tracing::debug!(
            slot,
            count = self.entries.len(),
            overwritten = outcome.overwritten,
            "history log entry appended"
        );
        outcome
    }

    /// Encodes `snapshot` under the active layout and appends it.
    pub fn trigger(&mut self, snapshot: &MeasurementSnapshot) -> Result<AppendOutcome, CoreError> {
        let raw = snapshot.encode(&self.layout());
        self.append(&raw)
    }

    /// Advances the log clock to `now`.
    ///
    /// Appends one entry built from `live` when an interval boundary lies
    /// between the previous tick and `now`. The first tick and ticks on a
    /// disabled log only record the clock.
    pub fn tick(
        &mut self,
        now: NaiveDateTime,
        live: &MeasurementSnapshot,
    ) -> Result<Option<AppendOutcome>, CoreError> {
        if !self.advance_clock(now) {
            return Ok(None);
        }
        let snapshot = MeasurementSnapshot {
            clock: now,
            ..live.clone()
        };
        self.trigger(&snapshot).map(Some)
    }

    /// Records `now` as the log clock without appending.
    ///
    /// Returns true when an entry is due: the log is enabled and an interval
    /// boundary lies between the previous clock value and `now`.
    pub fn advance_clock(&mut self, now: NaiveDateTime) -> bool {
        let Some(prev) = self.last_tick.replace(now) else {
            return false;
        };
        let due = self.enabled && schedule::crosses(self.config.interval, prev, now);
        if due {
            tracing::debug!(%prev, %now, interval = %self.config.interval, "interval boundary crossed");
        }
        due
    }

    /// Returns the entry at logical index `index`, 0 being the newest.
    pub fn read_at(&self, index: usize) -> Result<&LogEntry, CoreError> {
        let count = self.entries.len();
        if index >= count {
            return Err(CoreError::IndexOutOfRange { index, count });
        }
        let physical = (self.write_index + count - 1 - index) % count;
        Ok(&self.entries[physical])
    }

    /// Decodes the entry at logical index `index`.
    pub fn decode_at(&self, index: usize, strict: bool) -> Result<DecodedEntry, CoreError> {
        Ok(self.read_at(index)?.decode(strict)?)
    }

    /// Returns up to `count` entries starting at logical index `start`, newest first.
    pub fn read_range(&self, start: usize, count: usize) -> Vec<&LogEntry> {
        let end = start.saturating_add(count).min(self.entries.len());
        (start..end).filter_map(|i| self.read_at(i).ok()).collect()
    }

    /// Iterates all entries, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        (0..self.entries.len()).filter_map(move |i| self.read_at(i).ok())
    }

    /// Changes the capacity, keeping the newest `min(count, capacity)` entries.
    pub fn set_capacity(&mut self, capacity: u16) -> Result<(), CoreError> {
        check_capacity(capacity)?;
        let keep = self.entries.len().min(capacity as usize);
        let kept: Vec<LogEntry> = (0..keep)
            .rev()
            .filter_map(|i| self.read_at(i).ok().cloned())
            .collect();

        self.entries = kept;
        self.write_index = keep % capacity as usize;
        self.config.capacity = capacity;
        tracing::info!(capacity, kept = keep, "history log capacity changed");
        Ok(())
    }

    /// Changes the dataset for future entries. Stored entries keep their own selector.
    pub fn configure_selector(&mut self, selector: SelectorMask) {
        self.config.selector = selector;
        tracing::info!(%selector, "history log dataset configured");
    }

    pub fn configure_interval(&mut self, interval: IntervalPolicy) {
        self.config.interval = interval;
        tracing::info!(%interval, "history log interval configured");
    }

    /// Info view as reported by `getHistoryLogInfo`.
    pub fn info(&self) -> LogInfo {
        LogInfo {
            data_selector: self.config.selector,
            interval_selector: self.config.interval,
            nr_of_entries: self.entries.len() as u16,
            nr_of_possible_entries: self.config.capacity,
            data_size: self.layout().entry_len() as u16,
            instance_status: self.status,
        }
    }

    pub fn state(&self) -> LogState {
        if !self.enabled {
            LogState::Disabled
        } else if self.entries.is_empty() {
            LogState::Empty
        } else if self.entries.len() < self.config.capacity as usize {
            LogState::Partial
        } else {
            LogState::Full
        }
    }

    /// Layout of entries written under the active selector.
    pub fn layout(&self) -> RecordLayout {
        RecordLayout::resolve(self.config.selector)
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn capacity(&self) -> u16 {
        self.config.capacity
    }

    pub fn write_index(&self) -> usize {
        self.write_index
    }

    pub fn status(&self) -> InstanceStatus {
        self.status
    }

    pub fn last_tick(&self) -> Option<NaiveDateTime> {
        self.last_tick
    }
}

fn check_capacity(capacity: u16) -> Result<(), CoreError> {
    if capacity == 0 {
        return Err(CoreError::InvalidCapacity { capacity: 0 });
    }
    Ok(())
}
