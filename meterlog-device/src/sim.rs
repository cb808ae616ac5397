//! In-process simulated meter.
//!
//! The meter carries two history log instances, a real-time clock and a set
//! of live measurements. Setting the RTC advances every instance's clock and
//! generates entries on interval boundaries. With a snapshot store attached,
//! every state-changing command is persisted and `LowLevelPowerAndReset`
//! restores the logs from disk.

use crate::command::{
    fields, split_instance, CiStatus, Command, CommandChannel, InstanceId, ResponseFields,
    CONTROL_DISABLE, CONTROL_ENABLE,
};
use crate::config::Config;
use crate::error::DeviceError;
use bytes::{BufMut, Bytes, BytesMut};
use chrono::NaiveDateTime;
use meterlog_codec::{DateTimeF, IntervalPolicy, MeasurementSnapshot, SelectorMask};
use meterlog_core::{CoreError, LogConfig, LogInstance};
use meterlog_storage::SnapshotStore;
use parking_lot::Mutex;

struct MeterState {
    logs: [LogInstance; 2],
    clock: NaiveDateTime,
    live: MeasurementSnapshot,
    resets: u32,
    fail_next: Option<String>,
}

/// A meter simulated in memory.
pub struct SimulatedMeter {
    state: Mutex<MeterState>,
    store: Option<SnapshotStore>,
}

impl SimulatedMeter {
    /// Creates a meter with both logs disabled and configured with `defaults`.
    pub fn new(start: NaiveDateTime, defaults: LogConfig) -> Result<Self, DeviceError> {
        let mut logs = [LogInstance::new(defaults)?, LogInstance::new(defaults)?];
        for log in &mut logs {
            log.advance_clock(start);
        }
        Ok(Self {
            state: Mutex::new(MeterState {
                logs,
                clock: start,
                live: MeasurementSnapshot::at(start),
                resets: 0,
                fail_next: None,
            }),
            store: None,
        })
    }

    /// Builds a meter from configuration, restoring persisted logs if a data
    /// directory is configured.
    pub fn from_config(config: &Config) -> Result<Self, DeviceError> {
        let defaults = config.log.to_log_config()?;
        let start = config.simulation.start()?;

        let mut meter = Self::new(start, defaults)?;
        if let Some(dir) = config.storage.snapshots_dir() {
            meter = meter.with_store(SnapshotStore::open(dir)?)?;
        }
        if config.simulation.enable_on_start && !meter.log(InstanceId::Primary).is_enabled() {
            let mut state = meter.state.lock();
            state.logs[InstanceId::Primary.index()].enable_with(defaults)?;
            meter.persist(&state, InstanceId::Primary)?;
            tracing::info!("primary history log enabled on start");
        }
        Ok(meter)
    }

    /// Attaches a snapshot store and restores any logs it holds.
    pub fn with_store(mut self, store: SnapshotStore) -> Result<Self, DeviceError> {
        {
            let mut state = self.state.lock();
            restore(&store, &mut state)?;
        }
        self.store = Some(store);
        Ok(self)
    }

    /// Updates the live measurements.
    pub fn update_live(&self, f: impl FnOnce(&mut MeasurementSnapshot)) {
        let mut state = self.state.lock();
        f(&mut state.live);
    }

    pub fn live(&self) -> MeasurementSnapshot {
        self.state.lock().live.clone()
    }

    pub fn clock(&self) -> NaiveDateTime {
        self.state.lock().clock
    }

    /// Copy of the device-side log instance.
    pub fn log(&self, instance: InstanceId) -> LogInstance {
        self.state.lock().logs[instance.index()].clone()
    }

    /// Number of `LowLevelPowerAndReset` commands handled.
    pub fn reset_count(&self) -> u32 {
        self.state.lock().resets
    }

    /// Makes the next command fail with a communication error.
    pub fn fail_next_command(&self, reason: impl Into<String>) {
        self.state.lock().fail_next = Some(reason.into());
    }

    fn persist(&self, state: &MeterState, instance: InstanceId) -> Result<(), DeviceError> {
        if let Some(store) = &self.store {
            store.save(instance.key(), &state.logs[instance.index()])?;
        }
        Ok(())
    }

    fn handle(
        &self,
        state: &mut MeterState,
        command: Command,
        params: &[u8],
    ) -> Result<ResponseFields, Rejection> {
        let mut response = ResponseFields::new();
        match command {
            Command::ControlHistoryLog => {
                let (id, body) = split_instance(params, 2)?;
                let log = &mut state.logs[id.index()];
                match u16::from_le_bytes([body[0], body[1]]) {
                    CONTROL_ENABLE => {
                        let config = *log.config();
                        log.enable_with(config)?;
                    }
                    CONTROL_DISABLE => log.disable(),
                    _ => return Err(CiStatus::InvalidParameter.into()),
                }
                self.persist(state, id)?;
            }
            Command::ConfigureHistoryLogDataset => {
                let (id, body) = split_instance(params, 2)?;
                let selector = SelectorMask::from_wire(body)?;
                if selector.is_empty() {
                    return Err(CiStatus::InvalidParameter.into());
                }
                state.logs[id.index()].configure_selector(selector);
                self.persist(state, id)?;
                response.insert(
                    fields::RETURNED_COMMAND_BYTES.to_string(),
                    Bytes::copy_from_slice(params),
                );
            }
            Command::ConfigureHistoryLogInterval => {
                let (id, body) = split_instance(params, 2)?;
                let interval = IntervalPolicy::from_wire(body)?;
                state.logs[id.index()].configure_interval(interval);
                self.persist(state, id)?;
            }
            Command::SetMaximalAmountOfHistoryLogEntries => {
                let (id, body) = split_instance(params, 2)?;
                let capacity = u16::from_le_bytes([body[0], body[1]]);
                state.logs[id.index()].set_capacity(capacity)?;
                self.persist(state, id)?;
            }
            Command::DeleteHistoryLog => {
                let (id, _) = split_instance(params, 0)?;
                state.logs[id.index()].delete();
                self.persist(state, id)?;
            }
            Command::TriggerHistoryLogDatasetGeneration => {
                let (id, _) = split_instance(params, 0)?;
                let snapshot = MeasurementSnapshot {
                    clock: state.clock,
                    ..state.live.clone()
                };
                state.logs[id.index()].trigger(&snapshot)?;
                self.persist(state, id)?;
            }
            Command::ReadHistoryLog => {
                let (id, index, count) = read_params(params)?;
                let log = &state.logs[id.index()];
                let entries = log.read_range(index as usize, count as usize);
                let mut data = BytesMut::new();
                for entry in &entries {
                    data.put_slice(&entry.raw);
                }
                response.insert(fields::DATA_SET.to_string(), data.freeze());
                response.insert(
                    fields::NR_OF_ENTRIES.to_string(),
                    Bytes::copy_from_slice(&[entries.len() as u8]),
                );
            }
            Command::GetHistoryLogInfo => {
                let (id, _) = split_instance(params, 0)?;
                let info = state.logs[id.index()].info();
                let mut put = |name: &str, bytes: &[u8]| {
                    response.insert(name.to_string(), Bytes::copy_from_slice(bytes));
                };
                put(fields::DATA_SELECTOR, &info.data_selector.to_wire());
                put(fields::INTERVAL_SELECTOR, &info.interval_selector.to_wire());
                put(fields::NR_OF_ENTRIES, &info.nr_of_entries.to_le_bytes());
                put(
                    fields::NR_OF_POSSIBLE_ENTRIES,
                    &info.nr_of_possible_entries.to_le_bytes(),
                );
                put(fields::DATA_SIZE, &info.data_size.to_le_bytes());
                put(fields::INSTANCE_STATUS, &[info.instance_status.to_byte()]);
            }
            Command::SetRtcDateAndTime => {
                let stamp = DateTimeF::from_slice(params)?;
                let now = stamp.to_datetime().ok_or(CiStatus::InvalidParameter)?;
                state.clock = now;
                state.live.clock = now;
                let live = state.live.clone();
                for id in InstanceId::ALL {
                    if state.logs[id.index()].tick(now, &live)?.is_some() {
                        tracing::debug!(instance = %id, %now, "interval entry generated");
                    }
                    self.persist(state, id)?;
                }
            }
            Command::LowLevelPowerAndReset => {
                if params.len() > 1 {
                    return Err(CiStatus::InvalidLength.into());
                }
                state.resets += 1;
                if let Some(store) = &self.store {
                    restore(store, state)?;
                }
                tracing::info!(resets = state.resets, "meter reset");
            }
        }
        Ok(response)
    }
}

impl CommandChannel for SimulatedMeter {
    fn send_command(
        &self,
        name: &str,
        params: &[u8],
        return_fields: &[&str],
    ) -> Result<ResponseFields, DeviceError> {
        let command: Command = name.parse()?;
        let mut state = self.state.lock();

        if let Some(reason) = state.fail_next.take() {
            tracing::warn!(command = %command, "simulated communication failure");
            return Err(DeviceError::Communication(reason));
        }

        let mut response = match self.handle(&mut state, command, params) {
            Ok(response) => response,
            Err(Rejection::Ci(status)) => {
                tracing::debug!(command = %command, %status, "command rejected");
                return Err(DeviceError::CiField {
                    command: command.name().to_string(),
                    status,
                });
            }
            Err(Rejection::Internal(e)) => return Err(e),
        };

        if return_fields.is_empty() {
            return Ok(response);
        }
        let mut selected = ResponseFields::new();
        for field in return_fields {
            let value = response
                .remove(*field)
                .ok_or_else(|| DeviceError::MissingField {
                    command: command.name().to_string(),
                    field: field.to_string(),
                })?;
            selected.insert(field.to_string(), value);
        }
        Ok(selected)
    }
}

/// Why the simulated meter refused a command.
enum Rejection {
    /// Reported to the caller in the CI field.
    Ci(CiStatus),
    /// A failure of the simulation itself.
    Internal(DeviceError),
}

impl From<CiStatus> for Rejection {
    fn from(status: CiStatus) -> Self {
        Rejection::Ci(status)
    }
}

impl From<CoreError> for Rejection {
    fn from(err: CoreError) -> Self {
        Rejection::Ci(CiStatus::from(&err))
    }
}

impl From<meterlog_codec::CodecError> for Rejection {
    fn from(err: meterlog_codec::CodecError) -> Self {
        Rejection::Ci(CiStatus::from(&err))
    }
}

impl From<DeviceError> for Rejection {
    fn from(err: DeviceError) -> Self {
        Rejection::Internal(err)
    }
}

/// Parses `readHistoryLog` parameters: `[instance] index:u16le count:u8`.
///
/// An empty body reads the newest entry.
fn read_params(params: &[u8]) -> Result<(InstanceId, u16, u8), CiStatus> {
    match params.len() {
        0 | 1 => {
            let (id, _) = split_instance(params, 0)?;
            Ok((id, 0, 1))
        }
        _ => {
            let (id, body) = split_instance(params, 3)?;
            Ok((id, u16::from_le_bytes([body[0], body[1]]), body[2]))
        }
    }
}

fn restore(store: &SnapshotStore, state: &mut MeterState) -> Result<(), DeviceError> {
    for id in InstanceId::ALL {
        if let Some(log) = store.load(id.key())? {
            tracing::info!(instance = %id, entries = log.count(), "restored history log");
            state.logs[id.index()] = log;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::params;
    use chrono::NaiveDate;
    use meterlog_codec::{Field, DEFAULT_CAPACITY};
    use meterlog_core::InstanceStatus;
    use tempfile::TempDir;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn defaults() -> LogConfig {
        LogConfig {
            capacity: 3,
            interval: IntervalPolicy::Hourly,
            selector: SelectorMask::from_fields([Field::DateTimeTypeF, Field::OperatingHours]),
        }
    }

    fn meter() -> SimulatedMeter {
        let meter = SimulatedMeter::new(at(2021, 12, 31, 0, 0), defaults()).unwrap();
        meter
            .send_command(
                Command::ControlHistoryLog.name(),
                &params::control(InstanceId::Primary, true),
                &[],
            )
            .unwrap();
        meter
    }

    fn send(meter: &SimulatedMeter, command: Command, params: &[u8]) -> ResponseFields {
        meter.send_command(command.name(), params, &[]).unwrap()
    }

    #[test]
    fn test_trigger_and_read() {
        let meter = meter();
        meter.update_live(|live| live.operating_hours = 42);
        send(&meter, Command::TriggerHistoryLogDatasetGeneration, &[]);

        let response = meter
            .send_command(Command::ReadHistoryLog.name(), &[], &[fields::DATA_SET])
            .unwrap();
        let data = &response[fields::DATA_SET];
        assert_eq!(data.len(), 7);
        assert_eq!(&data[4..], &[42, 0, 0]);
        assert_eq!(response.len(), 1);
    }

    #[test]
    fn test_secondary_instance_is_independent() {
        let meter = meter();
        assert!(meter.log(InstanceId::Primary).is_enabled());
        assert!(!meter.log(InstanceId::Secondary).is_enabled());

        let err = meter
            .send_command(
                Command::TriggerHistoryLogDatasetGeneration.name(),
                &params::instance_only(InstanceId::Secondary),
                &[],
            )
            .unwrap_err();
        assert!(matches!(
            err,
            DeviceError::CiField {
                status: CiStatus::LogDisabled,
                ..
            }
        ));
    }

    #[test]
    fn test_info_fields() {
        let meter = meter();
        for _ in 0..4 {
            send(&meter, Command::TriggerHistoryLogDatasetGeneration, &[]);
        }
        let info = send(&meter, Command::GetHistoryLogInfo, &[]);
        assert_eq!(&info[fields::NR_OF_ENTRIES][..], &[3, 0]);
        assert_eq!(&info[fields::NR_OF_POSSIBLE_ENTRIES][..], &[3, 0]);
        assert_eq!(&info[fields::DATA_SIZE][..], &[7, 0]);
        assert_eq!(&info[fields::DATA_SELECTOR][..], &[0x04, 0x02]);
        assert_eq!(&info[fields::INTERVAL_SELECTOR][..], &[0x0C, 0x00]);
        assert_eq!(
            &info[fields::INSTANCE_STATUS][..],
            &[InstanceStatus::Wrapped.to_byte()]
        );
    }

    #[test]
    fn test_rtc_generates_hourly_entry() {
        let meter = meter();
        let stamp = DateTimeF::from_datetime(&at(2021, 12, 31, 1, 0)).unwrap();
        send(&meter, Command::SetRtcDateAndTime, &stamp.to_bytes());

        assert_eq!(meter.clock(), at(2021, 12, 31, 1, 0));
        let log = meter.log(InstanceId::Primary);
        assert_eq!(log.count(), 1);
        assert_eq!(&log.read_at(0).unwrap().raw[..4], &stamp.to_bytes());
    }

    #[test]
    fn test_invalid_requests() {
        let meter = meter();
        let reject = |command: Command, params: &[u8]| match meter.send_command(
            command.name(),
            params,
            &[],
        ) {
            Err(DeviceError::CiField { status, .. }) => status,
            other => panic!("expected CI field error, got {:?}", other),
        };

        let cases: [(Command, &[u8], CiStatus); 8] = [
            (Command::ConfigureHistoryLogDataset, &[0x20, 0x00], CiStatus::InvalidParameter),
            (Command::ConfigureHistoryLogDataset, &[0x00, 0x00], CiStatus::InvalidParameter),
            (Command::ConfigureHistoryLogInterval, &[0x0D, 0x00], CiStatus::InvalidParameter),
            (
                Command::SetMaximalAmountOfHistoryLogEntries,
                &[0x00, 0x00],
                CiStatus::InvalidParameter,
            ),
            (Command::ControlHistoryLog, &[0x01], CiStatus::InvalidLength),
            (Command::ControlHistoryLog, &[0x05, 0x01, 0x00], CiStatus::InvalidParameter),
            (Command::SetRtcDateAndTime, &[0xFF, 0xFF, 0xFF, 0xFF], CiStatus::InvalidParameter),
            (Command::SetRtcDateAndTime, &[0x00], CiStatus::InvalidLength),
        ];
        for (command, params, expected) in cases {
            assert_eq!(reject(command, params), expected, "{} {:02x?}", command, params);
        }

        assert!(matches!(
            meter.send_command("getHistoryLohInfo", &[], &[]),
            Err(DeviceError::UnknownCommand(_))
        ));
        assert!(matches!(
            meter.send_command(Command::DeleteHistoryLog.name(), &[], &[fields::DATA_SET]),
            Err(DeviceError::MissingField { .. })
        ));
    }

    #[test]
    fn test_injected_communication_failure() {
        let meter = meter();
        meter.fail_next_command("no answer from optical head");
        let err = meter
            .send_command(Command::GetHistoryLogInfo.name(), &[], &[])
            .unwrap_err();
        assert!(matches!(err, DeviceError::Communication(_)));
        assert!(err.is_retryable());
        send(&meter, Command::GetHistoryLogInfo, &[]);
    }

    #[test]
    fn test_reset_without_store_keeps_state() {
        let meter = meter();
        send(&meter, Command::TriggerHistoryLogDatasetGeneration, &[]);
        let before = meter.log(InstanceId::Primary);
        send(&meter, Command::LowLevelPowerAndReset, &[0x06]);
        assert_eq!(meter.log(InstanceId::Primary), before);
        assert_eq!(meter.reset_count(), 1);
    }

    #[test]
    fn test_reset_restores_from_store() {
        let dir = TempDir::new().unwrap();
        let meter = SimulatedMeter::new(at(2021, 12, 31, 0, 0), defaults())
            .unwrap()
            .with_store(SnapshotStore::open(dir.path()).unwrap())
            .unwrap();
        send(
            &meter,
            Command::ControlHistoryLog,
            &params::control(InstanceId::Primary, true),
        );
        send(
            &meter,
            Command::SetMaximalAmountOfHistoryLogEntries,
            &params::capacity(InstanceId::Primary, 5),
        );
        for _ in 0..3 {
            send(&meter, Command::TriggerHistoryLogDatasetGeneration, &[]);
        }
        let before = meter.log(InstanceId::Primary);
        send(&meter, Command::LowLevelPowerAndReset, &[0x06]);

        let after = meter.log(InstanceId::Primary);
        assert_eq!(after, before);
        assert_eq!(after.count(), 3);
        assert_eq!(after.write_index(), 3);

        let reopened = SimulatedMeter::new(at(2021, 12, 31, 0, 0), defaults())
            .unwrap()
            .with_store(SnapshotStore::open(dir.path()).unwrap())
            .unwrap();
        assert_eq!(reopened.log(InstanceId::Primary), before);
    }

    #[test]
    fn test_from_config() {
        let meter = SimulatedMeter::from_config(&Config::default()).unwrap();
        let log = meter.log(InstanceId::Primary);
        assert!(log.is_enabled());
        assert_eq!(log.capacity(), DEFAULT_CAPACITY);
        assert_eq!(log.info().data_size, 40);
    }

    #[test]
    fn test_zero_capacity_defaults_rejected() {
        let result = SimulatedMeter::new(
            at(2021, 12, 31, 0, 0),
            LogConfig {
                capacity: 0,
                ..defaults()
            },
        );
        match result {
            Err(DeviceError::Core(CoreError::InvalidCapacity { capacity })) => {
                assert_eq!(capacity, 0)
            }
            Err(e) => panic!("expected invalid capacity, got {}", e),
            Ok(_) => panic!("expected invalid capacity"),
        }
    }

    #[test]
    fn test_rtc_clock_survives_reset_while_disabled() {
        let dir = TempDir::new().unwrap();
        let meter = SimulatedMeter::new(at(2021, 12, 31, 0, 0), defaults())
            .unwrap()
            .with_store(SnapshotStore::open(dir.path()).unwrap())
            .unwrap();
        send(
            &meter,
            Command::ControlHistoryLog,
            &params::control(InstanceId::Primary, false),
        );
        send(
            &meter,
            Command::SetRtcDateAndTime,
            &DateTimeF::from_datetime(&at(2021, 12, 31, 5, 0))
                .unwrap()
                .to_bytes(),
        );
        let before = meter.log(InstanceId::Primary);
        assert_eq!(before.last_tick(), Some(at(2021, 12, 31, 5, 0)));

        send(&meter, Command::LowLevelPowerAndReset, &[0x06]);
        assert_eq!(meter.log(InstanceId::Primary), before);
        assert_eq!(
            meter.log(InstanceId::Secondary).last_tick(),
            Some(at(2021, 12, 31, 5, 0))
        );
    }
}
