//! Log info view (`getHistoryLogInfo`).

use meterlog_codec::{IntervalPolicy, SelectorMask};
use serde::{Deserialize, Serialize};

/// Whether the log has ever overwritten an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    #[default]
    Fresh,
    Wrapped,
}

impl InstanceStatus {
    pub fn to_byte(self) -> u8 {
        match self {
            InstanceStatus::Fresh => 0x00,
            InstanceStatus::Wrapped => 0x01,
        }
    }

    pub fn from_byte(byte: u8) -> Self {
        if byte & 0x01 != 0 {
            InstanceStatus::Wrapped
        } else {
            InstanceStatus::Fresh
        }
    }
}

/// Summary of one log instance as reported by the meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogInfo {
    pub data_selector: SelectorMask,
    pub interval_selector: IntervalPolicy,
    pub nr_of_entries: u16,
    pub nr_of_possible_entries: u16,
    /// Entry length in bytes under the current selector.
    pub data_size: u16,
    pub instance_status: InstanceStatus,
}
