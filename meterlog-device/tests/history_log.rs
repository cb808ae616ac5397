//! End-to-end history log scenarios against the simulated meter.

use chrono::{NaiveDate, NaiveDateTime};
use meterlog_codec::{
    ErrorCondition, Field, FieldValue, IntervalPolicy, SelectorMask, DEFAULT_CAPACITY,
};
use meterlog_core::{InstanceStatus, LogConfig, LogInstance, LogState};
use meterlog_device::{
    CiStatus, Command, CommandChannel, DeviceError, HistoryLogClient, InstanceId, SimulatedMeter,
};
use meterlog_storage::SnapshotStore;
use tempfile::TempDir;

fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, 0)
        .unwrap()
}

fn start() -> NaiveDateTime {
    at(2021, 12, 31, 0, 0)
}

fn model_for(config: LogConfig) -> LogInstance {
    let mut model = LogInstance::new(config).unwrap();
    model.advance_clock(start());
    model
}

#[test]
fn test_default_configuration() {
    let meter = SimulatedMeter::new(start(), LogConfig::default()).unwrap();
    let model = model_for(LogConfig::default());
    let mut client = HistoryLogClient::new(&meter, InstanceId::Primary, model);
    client.enable().unwrap();

    let info = client.info().unwrap();
    assert_eq!(info.nr_of_possible_entries, DEFAULT_CAPACITY);
    assert_eq!(info.data_selector, SelectorMask::ALL);
    assert_eq!(info.data_size, 40);
    assert_eq!(info.nr_of_entries, 0);
    assert_eq!(info.instance_status, InstanceStatus::Fresh);
}

#[test]
fn test_fill_overflow_delete_reset() {
    let dir = TempDir::new().unwrap();
    let config = LogConfig {
        capacity: 4,
        interval: IntervalPolicy::Daily,
        selector: SelectorMask::ALL,
    };
    let meter = SimulatedMeter::new(start(), config)
        .unwrap()
        .with_store(SnapshotStore::open(dir.path()).unwrap())
        .unwrap();
    let mut client = HistoryLogClient::new(&meter, InstanceId::Primary, model_for(config));
    client.configure(config).unwrap();

    for n in 0..6u32 {
        meter.update_live(|live| {
            live.sum_volume = 1000 + n;
            live.forward_volume = 1000 + n;
            live.current_flow = -(n as i32);
            live.error_state = [ErrorCondition::LowBattery].into_iter().collect();
        });
        client.trigger().unwrap();
    }
    assert_eq!(client.model().state(), LogState::Full);
    assert!(client.verify_all().unwrap().is_consistent());

    let info = client.info().unwrap();
    assert_eq!(info.nr_of_entries, 4);
    assert_eq!(info.instance_status, InstanceStatus::Wrapped);

    let newest = client.decode_entry(0, true).unwrap().unwrap();
    assert_eq!(
        newest
            .get(Field::SumVolume)
            .and_then(FieldValue::as_decimal)
            .map(|d| d.raw()),
        Some(1005)
    );
    assert_eq!(
        newest
            .get(Field::CurrentFlow)
            .and_then(FieldValue::as_decimal)
            .map(|d| d.raw()),
        Some(-5)
    );
    let oldest = client.decode_entry(3, true).unwrap().unwrap();
    assert_eq!(
        oldest
            .get(Field::SumVolume)
            .and_then(FieldValue::as_decimal)
            .map(|d| d.raw()),
        Some(1002)
    );

    client.reset().unwrap();
    assert_eq!(meter.reset_count(), 1);
    assert!(client.verify_all().unwrap().is_consistent());

    client.delete().unwrap();
    assert_eq!(client.read_entry(0).unwrap(), None);
    assert!(client.verify_all().unwrap().is_consistent());

    client.reset().unwrap();
    assert_eq!(client.info().unwrap().nr_of_entries, 0);
}

#[test]
fn test_capacity_three_keeps_newest() {
    let config = LogConfig {
        capacity: 3,
        interval: IntervalPolicy::Daily,
        selector: SelectorMask::from_fields([Field::OperatingHours]),
    };
    let meter = SimulatedMeter::new(start(), config).unwrap();
    let mut client = HistoryLogClient::new(&meter, InstanceId::Primary, model_for(config));
    client.enable().unwrap();

    for hours in [b'A', b'B', b'C', b'D'] {
        meter.update_live(|live| live.operating_hours = hours as u32);
        client.trigger().unwrap();
    }

    let tags: Vec<u8> = client
        .read_entries(0, 10)
        .unwrap()
        .iter()
        .map(|raw| raw[0])
        .collect();
    assert_eq!(tags, vec![b'D', b'C', b'B']);
}

#[test]
fn test_hourly_and_daily_intervals() {
    let config = LogConfig {
        capacity: 30,
        interval: IntervalPolicy::Hourly,
        selector: SelectorMask::from_fields([Field::DateTimeTypeF]),
    };
    let meter = SimulatedMeter::new(start(), config).unwrap();
    let mut client = HistoryLogClient::new(&meter, InstanceId::Primary, model_for(config));
    client.enable().unwrap();

    client.set_clock(at(2021, 12, 31, 1, 0)).unwrap();
    assert_eq!(client.info().unwrap().nr_of_entries, 1);

    client.configure_interval(IntervalPolicy::Daily).unwrap();
    client.set_clock(at(2021, 12, 31, 23, 0)).unwrap();
    assert_eq!(client.info().unwrap().nr_of_entries, 1);
    client.set_clock(at(2022, 1, 1, 0, 0)).unwrap();
    assert_eq!(client.info().unwrap().nr_of_entries, 2);

    let newest = client.decode_entry(0, true).unwrap().unwrap();
    let stamp = newest
        .get(Field::DateTimeTypeF)
        .and_then(FieldValue::as_datetime_f)
        .unwrap();
    assert_eq!(stamp.to_datetime(), Some(at(2022, 1, 1, 0, 0)));
    assert!(client.verify_all().unwrap().is_consistent());
}

#[test]
fn test_two_instances_share_the_clock() {
    let hourly = LogConfig {
        capacity: 10,
        interval: IntervalPolicy::Hourly,
        selector: SelectorMask::from_fields([Field::DateTimeTypeF]),
    };
    let meter = SimulatedMeter::new(start(), hourly).unwrap();
    let mut primary = HistoryLogClient::new(&meter, InstanceId::Primary, model_for(hourly));
    let mut secondary = HistoryLogClient::new(&meter, InstanceId::Secondary, model_for(hourly));
    primary.enable().unwrap();
    secondary.enable().unwrap();
    secondary.configure_interval(IntervalPolicy::Daily).unwrap();

    for hour in 1..=3 {
        let now = at(2021, 12, 31, hour, 0);
        primary.set_clock(now).unwrap();
        secondary.observe_clock(now).unwrap();
    }

    assert_eq!(primary.info().unwrap().nr_of_entries, 3);
    assert_eq!(secondary.info().unwrap().nr_of_entries, 0);
    assert!(primary.verify_all().unwrap().is_consistent());
    assert!(secondary.verify_all().unwrap().is_consistent());
}

#[test]
fn test_capacity_change_keeps_newest_entries() {
    let config = LogConfig {
        capacity: 5,
        interval: IntervalPolicy::Daily,
        selector: SelectorMask::from_fields([Field::ErrorHours]),
    };
    let meter = SimulatedMeter::new(start(), config).unwrap();
    let mut client = HistoryLogClient::new(&meter, InstanceId::Primary, model_for(config));
    client.enable().unwrap();
    for n in 0..5u16 {
        meter.update_live(|live| live.error_hours = n);
        client.trigger().unwrap();
    }

    client.set_capacity(2).unwrap();
    assert!(client.verify_all().unwrap().is_consistent());
    assert_eq!(client.info().unwrap().nr_of_entries, 2);
    assert_eq!(&client.read_entry(1).unwrap().unwrap()[..], &[3, 0]);
}

#[test]
fn test_communication_errors_propagate() {
    let meter = SimulatedMeter::new(start(), LogConfig::default()).unwrap();
    let model = model_for(LogConfig::default());
    let mut client = HistoryLogClient::new(&meter, InstanceId::Primary, model);

    meter.fail_next_command("timeout");
    let err = client.info().unwrap_err();
    assert_eq!(err.error_code(), "COMMUNICATION");
    assert!(err.is_retryable());

    // Delete enables a disabled log.
    client.delete().unwrap();
    client.trigger().unwrap();
    assert!(client.verify().unwrap().is_consistent());

    client.disable().unwrap();
    match client.trigger() {
        Err(DeviceError::CiField { command, status }) => {
            assert_eq!(command, Command::TriggerHistoryLogDatasetGeneration.name());
            assert_eq!(status, CiStatus::LogDisabled);
        }
        other => panic!("expected CI field error, got {:?}", other),
    }
}

#[test]
fn test_raw_channel_usage() {
    let meter = SimulatedMeter::new(start(), LogConfig::default()).unwrap();
    meter
        .send_command("controlHistoryLog", &[0x01, 0x00], &[])
        .unwrap();
    meter
        .send_command("configureHistoryLogInterval", &[0x0C, 0x00], &[])
        .unwrap();
    meter
        .send_command("Set_rtcDateAndTime", &[0x00, 0x01, 0xBF, 0x2C], &[])
        .unwrap();

    let response = meter
        .send_command("getHistoryLogInfo", &[], &["nrOfEntries", "intervalSelector"])
        .unwrap();
    assert_eq!(&response["nrOfEntries"][..], &[1, 0]);
    assert_eq!(&response["intervalSelector"][..], &[0x0C, 0x00]);
}

#[test]
fn test_clock_set_while_disabled_survives_power_cycle() {
    let dir = TempDir::new().unwrap();
    let config = LogConfig {
        capacity: 10,
        interval: IntervalPolicy::Hourly,
        selector: SelectorMask::from_fields([Field::DateTimeTypeF]),
    };
    let meter = SimulatedMeter::new(start(), config)
        .unwrap()
        .with_store(SnapshotStore::open(dir.path()).unwrap())
        .unwrap();
    let mut client = HistoryLogClient::new(&meter, InstanceId::Primary, model_for(config));
    client.enable().unwrap();
    client.disable().unwrap();

    client.set_clock(at(2021, 12, 31, 5, 0)).unwrap();
    let before = meter.log(InstanceId::Primary).last_tick();
    client.reset().unwrap();
    assert_eq!(meter.log(InstanceId::Primary).last_tick(), before);

    client.enable().unwrap();
    assert_eq!(client.set_clock(at(2021, 12, 31, 5, 30)).unwrap(), None);
    assert_eq!(client.info().unwrap().nr_of_entries, 0);
    assert!(client.verify_all().unwrap().is_consistent());
}
