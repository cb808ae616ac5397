//! History log client.
//!
//! Each call sends one command to the meter and, once the meter accepted
//! it, applies the same transition to a reference [`LogInstance`]. Entries
//! generated by the meter itself (manual trigger, interval boundary) are read
//! back and appended to the model so their content can be compared later.

use crate::command::{
    fields, params, require, require_le, Command, CommandChannel, InstanceId, ResponseFields,
    RESET_POWER_CYCLE,
};
use crate::error::DeviceError;
use bytes::Bytes;
use chrono::NaiveDateTime;
use meterlog_codec::{
    CodecError, DateTimeF, DecodedEntry, IntervalPolicy, RecordDecoder, SelectorMask,
};
use meterlog_core::{InstanceStatus, LogConfig, LogInfo, LogInstance};
use std::fmt;

/// One difference between the meter and the reference model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Divergence {
    /// An info field differs.
    Info {
        field: &'static str,
        device: String,
        model: String,
    },
    /// The entry at `index` differs; `None` means the side holds no entry there.
    Entry {
        index: usize,
        device: Option<Vec<u8>>,
        model: Option<Vec<u8>>,
    },
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Divergence::Info {
                field,
                device,
                model,
            } => write!(f, "{}: device {} != model {}", field, device, model),
            Divergence::Entry {
                index,
                device,
                model,
            } => write!(
                f,
                "entry {}: device {:02x?} != model {:02x?}",
                index, device, model
            ),
        }
    }
}

/// Result of comparing the meter against the model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub divergences: Vec<Divergence>,
}

impl VerifyReport {
    pub fn is_consistent(&self) -> bool {
        self.divergences.is_empty()
    }
}

/// Client for one history log instance of a meter.
pub struct HistoryLogClient<C> {
    channel: C,
    instance: InstanceId,
    model: LogInstance,
}

impl<C: CommandChannel> HistoryLogClient<C> {
    /// Creates a client whose model starts as `model`.
    ///
    /// The caller is responsible for `model` matching the meter's state.
    pub fn new(channel: C, instance: InstanceId, model: LogInstance) -> Self {
        Self {
            channel,
            instance,
            model,
        }
    }

    pub fn model(&self) -> &LogInstance {
        &self.model
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    fn send(
        &self,
        command: Command,
        params: &[u8],
        return_fields: &[&str],
    ) -> Result<ResponseFields, DeviceError> {
        tracing::debug!(
            instance = %self.instance,
            command = %command,
            params = ?params,
            "sending command"
        );
        self.channel
            .send_command(command.name(), params, return_fields)
            .map_err(|e| {
                tracing::warn!(command = %command, error = %e, "command failed");
                e
            })
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Enables the log with its current configuration, clearing its entries.
    pub fn enable(&mut self) -> Result<(), DeviceError> {
        self.send(
            Command::ControlHistoryLog,
            &params::control(self.instance, true),
            &[],
        )?;
        let config = *self.model.config();
        self.model.enable_with(config)?;
        Ok(())
    }

    pub fn disable(&mut self) -> Result<(), DeviceError> {
        self.send(
            Command::ControlHistoryLog,
            &params::control(self.instance, false),
            &[],
        )?;
        self.model.disable();
        Ok(())
    }

    /// Applies a full configuration and enables the log.
    pub fn configure(&mut self, config: LogConfig) -> Result<(), DeviceError> {
        self.configure_dataset(config.selector)?;
        self.configure_interval(config.interval)?;
        self.set_capacity(config.capacity)?;
        self.enable()
    }

    /// Sets the dataset. Returns the command bytes echoed by the meter.
    pub fn configure_dataset(&mut self, selector: SelectorMask) -> Result<Bytes, DeviceError> {
        let request = params::dataset(self.instance, selector);
        let response = self.send(
            Command::ConfigureHistoryLogDataset,
            &request,
            &[fields::RETURNED_COMMAND_BYTES],
        )?;
        self.model.configure_selector(selector);
        let echoed = require(
            &response,
            Command::ConfigureHistoryLogDataset,
            fields::RETURNED_COMMAND_BYTES,
        )?;
        Ok(echoed.clone())
    }

    pub fn configure_interval(&mut self, interval: IntervalPolicy) -> Result<(), DeviceError> {
        self.send(
            Command::ConfigureHistoryLogInterval,
            &params::interval(self.instance, interval),
            &[],
        )?;
        self.model.configure_interval(interval);
        Ok(())
    }

    pub fn set_capacity(&mut self, capacity: u16) -> Result<(), DeviceError> {
        self.send(
            Command::SetMaximalAmountOfHistoryLogEntries,
            &params::capacity(self.instance, capacity),
            &[],
        )?;
        self.model.set_capacity(capacity)?;
        Ok(())
    }

    pub fn delete(&mut self) -> Result<(), DeviceError> {
        self.send(
            Command::DeleteHistoryLog,
            &params::instance_only(self.instance),
            &[],
        )?;
        self.model.delete();
        Ok(())
    }

    // =========================================================================
    // Entry generation
    // =========================================================================

    /// Triggers manual generation and returns the new entry.
    pub fn trigger(&mut self) -> Result<Bytes, DeviceError> {
        self.send(
            Command::TriggerHistoryLogDatasetGeneration,
            &params::instance_only(self.instance),
            &[],
        )?;
        self.mirror_newest()
    }

    /// Sets the meter clock. Returns the entry generated by an interval
    /// boundary, if the model expects one.
    pub fn set_clock(&mut self, now: NaiveDateTime) -> Result<Option<Bytes>, DeviceError> {
        let stamp = DateTimeF::from_datetime(&now).ok_or_else(|| CodecError::TimestampRange {
            field: meterlog_codec::Field::DateTimeTypeF,
            reason: format!("{} outside 2000..=2099", now),
        })?;
        self.send(Command::SetRtcDateAndTime, &stamp.to_bytes(), &[])?;
        self.observe_clock(now)
    }

    /// Applies a clock change made through another client to the model.
    pub fn observe_clock(&mut self, now: NaiveDateTime) -> Result<Option<Bytes>, DeviceError> {
        if self.model.advance_clock(now) {
            self.mirror_newest().map(Some)
        } else {
            Ok(None)
        }
    }

    fn mirror_newest(&mut self) -> Result<Bytes, DeviceError> {
        let raw = self.read_entry(0)?.ok_or_else(|| DeviceError::MalformedResponse {
            command: Command::ReadHistoryLog.name().to_string(),
            field: fields::DATA_SET.to_string(),
            reason: "meter reports no entry after generation".to_string(),
        })?;
        self.model.append(&raw)?;
        Ok(raw)
    }

    /// Power-cycles the meter. The log is expected to survive unchanged.
    pub fn reset(&mut self) -> Result<(), DeviceError> {
        self.send(Command::LowLevelPowerAndReset, &[RESET_POWER_CYCLE], &[])?;
        tracing::info!(instance = %self.instance, "meter power-cycled");
        Ok(())
    }

    // =========================================================================
    // Reading
    // =========================================================================

    /// Reads `count` raw entries starting at `index` in one request,
    /// concatenated newest first.
    pub fn read_raw(&self, index: u16, count: u8) -> Result<(Bytes, u8), DeviceError> {
        let response = self.send(
            Command::ReadHistoryLog,
            &params::read(self.instance, index, count),
            &[fields::DATA_SET, fields::NR_OF_ENTRIES],
        )?;
        let data = require(&response, Command::ReadHistoryLog, fields::DATA_SET)?.clone();
        let returned =
            require_le::<1>(&response, Command::ReadHistoryLog, fields::NR_OF_ENTRIES)? as u8;
        Ok((data, returned))
    }

    /// Reads the entry at logical index `index`, 0 being the newest.
    pub fn read_entry(&self, index: u16) -> Result<Option<Bytes>, DeviceError> {
        let (data, returned) = self.read_raw(index, 1)?;
        Ok((returned > 0).then_some(data))
    }

    /// Reads up to `count` entries starting at `index`, newest first.
    pub fn read_entries(&self, index: u16, count: u16) -> Result<Vec<Bytes>, DeviceError> {
        let mut entries = Vec::new();
        for i in index..index.saturating_add(count) {
            match self.read_entry(i)? {
                Some(raw) => entries.push(raw),
                None => break,
            }
        }
        Ok(entries)
    }

    /// Reads and decodes the entry at `index` with the layout the model
    /// recorded it under.
    pub fn decode_entry(
        &self,
        index: u16,
        strict: bool,
    ) -> Result<Option<DecodedEntry>, DeviceError> {
        let Some(raw) = self.read_entry(index)? else {
            return Ok(None);
        };
        let layout = match self.model.read_at(index as usize) {
            Ok(entry) => entry.layout(),
            Err(_) => self.model.layout(),
        };
        Ok(Some(RecordDecoder::new(layout).strict(strict).decode(&raw)?))
    }

    /// Reads the log info from the meter.
    pub fn info(&self) -> Result<LogInfo, DeviceError> {
        let command = Command::GetHistoryLogInfo;
        let response = self.send(command, &params::instance_only(self.instance), &[])?;

        let data_selector =
            SelectorMask::from_wire(require(&response, command, fields::DATA_SELECTOR)?)?;
        let interval_selector =
            IntervalPolicy::from_wire(require(&response, command, fields::INTERVAL_SELECTOR)?)?;
        let status = require_le::<1>(&response, command, fields::INSTANCE_STATUS)? as u8;

        Ok(LogInfo {
            data_selector,
            interval_selector,
            nr_of_entries: require_le::<2>(&response, command, fields::NR_OF_ENTRIES)? as u16,
            nr_of_possible_entries: require_le::<2>(
                &response,
                command,
                fields::NR_OF_POSSIBLE_ENTRIES,
            )? as u16,
            data_size: require_le::<2>(&response, command, fields::DATA_SIZE)? as u16,
            instance_status: InstanceStatus::from_byte(status),
        })
    }

    // =========================================================================
    // Verification
    // =========================================================================

    /// Compares the meter's info and newest entry against the model.
    pub fn verify(&self) -> Result<VerifyReport, DeviceError> {
        let mut report = VerifyReport::default();
        self.compare_info(&mut report)?;
        self.compare_entry(0, &mut report)?;
        self.log_report(&report);
        Ok(report)
    }

    /// Compares the meter's info and every stored entry against the model.
    pub fn verify_all(&self) -> Result<VerifyReport, DeviceError> {
        let mut report = VerifyReport::default();
        self.compare_info(&mut report)?;
        let stored = self.model.count().max(1);
        for index in 0..stored {
            self.compare_entry(index, &mut report)?;
        }
        self.log_report(&report);
        Ok(report)
    }

    fn compare_info(&self, report: &mut VerifyReport) -> Result<(), DeviceError> {
        let device = self.info()?;
        let model = self.model.info();

        let mut check = |field: &'static str, device: String, model: String| {
            if device != model {
                report.divergences.push(Divergence::Info {
                    field,
                    device,
                    model,
                });
            }
        };
        check(
            fields::DATA_SELECTOR,
            device.data_selector.to_string(),
            model.data_selector.to_string(),
        );
        check(
            fields::INTERVAL_SELECTOR,
            device.interval_selector.to_string(),
            model.interval_selector.to_string(),
        );
        check(
            fields::NR_OF_ENTRIES,
            device.nr_of_entries.to_string(),
            model.nr_of_entries.to_string(),
        );
        check(
            fields::NR_OF_POSSIBLE_ENTRIES,
            device.nr_of_possible_entries.to_string(),
            model.nr_of_possible_entries.to_string(),
        );
        check(
            fields::DATA_SIZE,
            device.data_size.to_string(),
            model.data_size.to_string(),
        );
        check(
            fields::INSTANCE_STATUS,
            format!("{:?}", device.instance_status),
            format!("{:?}", model.instance_status),
        );
        Ok(())
    }

    fn compare_entry(&self, index: usize, report: &mut VerifyReport) -> Result<(), DeviceError> {
        let device = match u16::try_from(index) {
            Ok(i) => self.read_entry(i)?.map(|raw| raw.to_vec()),
            Err(_) => None,
        };
        let model = self.model.read_at(index).ok().map(|entry| entry.raw.clone());
        if device != model {
            report.divergences.push(Divergence::Entry {
                index,
                device,
                model,
            });
        }
        Ok(())
    }

    fn log_report(&self, report: &VerifyReport) {
        if report.is_consistent() {
            tracing::debug!(instance = %self.instance, "meter matches model");
        } else {
            for divergence in &report.divergences {
                tracing::warn!(instance = %self.instance, "divergence: {}", divergence);
            }
        }
    }
}
