//! Command channel to the meter.
//!
//! Every history-log command takes an optional leading instance byte
//! (`00` primary, `01` secondary). Without it the primary instance is used.

use crate::error::DeviceError;
use bytes::{BufMut, Bytes, BytesMut};
use meterlog_codec::{CodecError, IntervalPolicy, SelectorMask};
use meterlog_core::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Response of a command: field name to raw bytes.
pub type ResponseFields = BTreeMap<String, Bytes>;

/// Response field names.
pub mod fields {
    pub const DATA_SET: &str = "dataSet";
    pub const NR_OF_ENTRIES: &str = "nrOfEntries";
    pub const NR_OF_POSSIBLE_ENTRIES: &str = "nrOfPossibleEntries";
    pub const DATA_SELECTOR: &str = "dataSelector";
    pub const INTERVAL_SELECTOR: &str = "intervalSelector";
    pub const DATA_SIZE: &str = "dataSize";
    pub const INSTANCE_STATUS: &str = "instanceStatus";
    pub const RETURNED_COMMAND_BYTES: &str = "returnedCommandBytes";
}

/// Control word for `controlHistoryLog`.
pub const CONTROL_ENABLE: u16 = 0x0001;
pub const CONTROL_DISABLE: u16 = 0x0000;

/// Reset kind sent with `LowLevelPowerAndReset`.
pub const RESET_POWER_CYCLE: u8 = 0x06;

/// A blocking request/response channel to a meter.
pub trait CommandChannel {
    /// Sends `name` with raw `params` and returns the requested fields.
    ///
    /// An empty `return_fields` asks for every field the command produces.
    fn send_command(
        &self,
        name: &str,
        params: &[u8],
        return_fields: &[&str],
    ) -> Result<ResponseFields, DeviceError>;
}

impl<C: CommandChannel + ?Sized> CommandChannel for &C {
    fn send_command(
        &self,
        name: &str,
        params: &[u8],
        return_fields: &[&str],
    ) -> Result<ResponseFields, DeviceError> {
        (**self).send_command(name, params, return_fields)
    }
}

impl<C: CommandChannel + ?Sized> CommandChannel for Arc<C> {
    fn send_command(
        &self,
        name: &str,
        params: &[u8],
        return_fields: &[&str],
    ) -> Result<ResponseFields, DeviceError> {
        (**self).send_command(name, params, return_fields)
    }
}

/// History log instance on the meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceId {
    #[default]
    Primary,
    Secondary,
}

impl InstanceId {
    pub const ALL: [InstanceId; 2] = [InstanceId::Primary, InstanceId::Secondary];

    pub fn to_byte(self) -> u8 {
        match self {
            InstanceId::Primary => 0x00,
            InstanceId::Secondary => 0x01,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(InstanceId::Primary),
            0x01 => Some(InstanceId::Secondary),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        self.to_byte() as usize
    }

    /// Key under which the instance is persisted.
    pub fn key(self) -> &'static str {
        match self {
            InstanceId::Primary => "primary",
            InstanceId::Secondary => "secondary",
        }
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Commands understood by the meter's history log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    ControlHistoryLog,
    ConfigureHistoryLogDataset,
    ConfigureHistoryLogInterval,
    SetMaximalAmountOfHistoryLogEntries,
    DeleteHistoryLog,
    TriggerHistoryLogDatasetGeneration,
    ReadHistoryLog,
    GetHistoryLogInfo,
    SetRtcDateAndTime,
    LowLevelPowerAndReset,
}

impl Command {
    pub const ALL: [Command; 10] = [
        Command::ControlHistoryLog,
        Command::ConfigureHistoryLogDataset,
        Command::ConfigureHistoryLogInterval,
        Command::SetMaximalAmountOfHistoryLogEntries,
        Command::DeleteHistoryLog,
        Command::TriggerHistoryLogDatasetGeneration,
        Command::ReadHistoryLog,
        Command::GetHistoryLogInfo,
        Command::SetRtcDateAndTime,
        Command::LowLevelPowerAndReset,
    ];

    /// Command name on the wire.
    pub fn name(self) -> &'static str {
        match self {
            Command::ControlHistoryLog => "controlHistoryLog",
            Command::ConfigureHistoryLogDataset => "configureHistoryLogDataset",
            Command::ConfigureHistoryLogInterval => "configureHistoryLogInterval",
            Command::SetMaximalAmountOfHistoryLogEntries => "setMaximalAmountOfHistoryLogEntries",
            Command::DeleteHistoryLog => "deleteHistoryLog",
            Command::TriggerHistoryLogDatasetGeneration => "triggerHistoryLogDatasetGeneration",
            Command::ReadHistoryLog => "readHistoryLog",
            Command::GetHistoryLogInfo => "getHistoryLogInfo",
            Command::SetRtcDateAndTime => "Set_rtcDateAndTime",
            Command::LowLevelPowerAndReset => "LowLevelPowerAndReset",
        }
    }

    /// Parameter length without the instance byte.
    ///
    /// `None` for commands that are not addressed to a log instance.
    pub fn base_params_len(self) -> Option<usize> {
        match self {
            Command::ControlHistoryLog
            | Command::ConfigureHistoryLogDataset
            | Command::ConfigureHistoryLogInterval
            | Command::SetMaximalAmountOfHistoryLogEntries => Some(2),
            Command::DeleteHistoryLog
            | Command::TriggerHistoryLogDatasetGeneration
            | Command::GetHistoryLogInfo => Some(0),
            Command::ReadHistoryLog => Some(3),
            Command::SetRtcDateAndTime | Command::LowLevelPowerAndReset => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Command {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| DeviceError::UnknownCommand(s.to_string()))
    }
}

/// Status reported by the meter in the CI field of a rejected command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CiStatus {
    InvalidLength = 0x01,
    InvalidParameter = 0x02,
    LogDisabled = 0x03,
    IndexOutOfRange = 0x04,
}

impl CiStatus {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(CiStatus::InvalidLength),
            0x02 => Some(CiStatus::InvalidParameter),
            0x03 => Some(CiStatus::LogDisabled),
            0x04 => Some(CiStatus::IndexOutOfRange),
            _ => None,
        }
    }
}

impl fmt::Display for CiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            CiStatus::InvalidLength => "invalid parameter length",
            CiStatus::InvalidParameter => "invalid parameter",
            CiStatus::LogDisabled => "history log disabled",
            CiStatus::IndexOutOfRange => "index out of range",
        };
        write!(f, "CI {:#04x} ({})", self.code(), text)
    }
}

impl From<&CodecError> for CiStatus {
    fn from(err: &CodecError) -> Self {
        match err {
            CodecError::Truncated { .. } => CiStatus::InvalidLength,
            _ => CiStatus::InvalidParameter,
        }
    }
}

impl From<&CoreError> for CiStatus {
    fn from(err: &CoreError) -> Self {
        match err {
            CoreError::LogDisabled => CiStatus::LogDisabled,
            CoreError::IndexOutOfRange { .. } => CiStatus::IndexOutOfRange,
            CoreError::InvalidCapacity { .. } => CiStatus::InvalidParameter,
            CoreError::Codec(e) => CiStatus::from(e),
        }
    }
}

/// Splits the optional leading instance byte off `params`.
pub fn split_instance(params: &[u8], base_len: usize) -> Result<(InstanceId, &[u8]), CiStatus> {
    if params.len() == base_len {
        Ok((InstanceId::Primary, params))
    } else if params.len() == base_len + 1 {
        let instance = InstanceId::from_byte(params[0]).ok_or(CiStatus::InvalidParameter)?;
        Ok((instance, &params[1..]))
    } else {
        Err(CiStatus::InvalidLength)
    }
}

/// Request parameter builders.
pub mod params {
    use super::*;

    fn addressed(instance: InstanceId, body: &[u8]) -> Bytes {
        let mut buf = BytesMut::with_capacity(body.len() + 1);
        buf.put_u8(instance.to_byte());
        buf.put_slice(body);
        buf.freeze()
    }

    pub fn control(instance: InstanceId, enable: bool) -> Bytes {
        let word = if enable {
            CONTROL_ENABLE
        } else {
            CONTROL_DISABLE
        };
        addressed(instance, &word.to_le_bytes())
    }

    pub fn dataset(instance: InstanceId, selector: SelectorMask) -> Bytes {
        addressed(instance, &selector.to_wire())
    }

    pub fn interval(instance: InstanceId, interval: IntervalPolicy) -> Bytes {
        addressed(instance, &interval.to_wire())
    }

    pub fn capacity(instance: InstanceId, capacity: u16) -> Bytes {
        addressed(instance, &capacity.to_le_bytes())
    }

    pub fn instance_only(instance: InstanceId) -> Bytes {
        addressed(instance, &[])
    }

    pub fn read(instance: InstanceId, index: u16, count: u8) -> Bytes {
        let mut body = BytesMut::with_capacity(3);
        body.put_u16_le(index);
        body.put_u8(count);
        addressed(instance, &body)
    }
}

/// Returns the response field `name` or `MissingField`.
pub fn require<'a>(
    response: &'a ResponseFields,
    command: Command,
    name: &str,
) -> Result<&'a Bytes, DeviceError> {
    response
        .get(name)
        .ok_or_else(|| DeviceError::MissingField {
            command: command.name().to_string(),
            field: name.to_string(),
        })
}

/// Reads a little-endian integer field of exactly `N` bytes.
pub fn require_le<const N: usize>(
    response: &ResponseFields,
    command: Command,
    name: &str,
) -> Result<u64, DeviceError> {
    let raw = require(response, command, name)?;
    if raw.len() != N {
        return Err(DeviceError::MalformedResponse {
            command: command.name().to_string(),
            field: name.to_string(),
            reason: format!("expected {} bytes, got {}", N, raw.len()),
        });
    }
    Ok(raw
        .iter()
        .rev()
        .fold(0u64, |acc, byte| (acc << 8) | *byte as u64))
}
