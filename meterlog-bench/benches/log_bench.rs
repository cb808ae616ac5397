//! History log model and simulated meter benchmarks.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use meterlog_codec::{IntervalPolicy, MeasurementSnapshot, SelectorMask};
use meterlog_core::{LogConfig, LogInstance};
use meterlog_device::{HistoryLogClient, InstanceId, SimulatedMeter};
use meterlog_storage::SnapshotStore;
use tempfile::TempDir;

fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2021, 12, 31)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn config(capacity: u16) -> LogConfig {
    LogConfig {
        capacity,
        interval: IntervalPolicy::Hourly,
        selector: SelectorMask::ALL,
    }
}

fn bench_trigger(c: &mut Criterion) {
    let mut group = c.benchmark_group("log_trigger");
    group.throughput(Throughput::Elements(1));
    let snapshot = MeasurementSnapshot::at(start());

    for capacity in [16u16, 1000] {
        group.bench_with_input(
            BenchmarkId::new("wrapped", capacity),
            &capacity,
            |b, &capacity| {
                let mut log = LogInstance::enabled(config(capacity)).unwrap();
                for _ in 0..capacity {
                    log.trigger(&snapshot).unwrap();
                }
                b.iter(|| black_box(log.trigger(&snapshot).unwrap()));
            },
        );
    }

    group.finish();
}

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("log_tick");
    group.throughput(Throughput::Elements(1));

    group.bench_function("hourly", |b| {
        let mut log = LogInstance::enabled(config(1000)).unwrap();
        let mut now = start();
        let live = MeasurementSnapshot::at(now);
        log.tick(now, &live).unwrap();
        b.iter(|| {
            now += Duration::minutes(30);
            black_box(log.tick(now, &live).unwrap())
        });
    });

    group.finish();
}

fn bench_read_range(c: &mut Criterion) {
    let mut group = c.benchmark_group("log_read_range");
    let mut log = LogInstance::enabled(config(1000)).unwrap();
    let snapshot = MeasurementSnapshot::at(start());
    for _ in 0..1500 {
        log.trigger(&snapshot).unwrap();
    }

    for count in [1usize, 10, 100] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| black_box(log.read_range(0, count)));
        });
    }

    group.finish();
}

fn bench_client_trigger_verify(c: &mut Criterion) {
    let mut group = c.benchmark_group("client");
    group.throughput(Throughput::Elements(1));

    group.bench_function("trigger", |b| {
        let meter = SimulatedMeter::new(start(), config(100)).unwrap();
        let model = LogInstance::new(config(100)).unwrap();
        let mut client = HistoryLogClient::new(&meter, InstanceId::Primary, model);
        client.enable().unwrap();
        b.iter(|| client.trigger().unwrap());
    });

    group.bench_function("verify", |b| {
        let meter = SimulatedMeter::new(start(), config(100)).unwrap();
        let model = LogInstance::new(config(100)).unwrap();
        let mut client = HistoryLogClient::new(&meter, InstanceId::Primary, model);
        client.enable().unwrap();
        for _ in 0..100 {
            client.trigger().unwrap();
        }
        b.iter(|| black_box(client.verify().unwrap()));
    });

    group.finish();
}

fn bench_snapshot_save(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot_save");
    let snapshot = MeasurementSnapshot::at(start());

    for capacity in [10u16, 1000] {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::open(dir.path()).unwrap();
        let mut log = LogInstance::enabled(config(capacity)).unwrap();
        for _ in 0..capacity {
            log.trigger(&snapshot).unwrap();
        }
        group.bench_with_input(BenchmarkId::from_parameter(capacity), &log, |b, log| {
            b.iter(|| black_box(store.save("primary", log).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_trigger,
    bench_tick,
    bench_read_range,
    bench_client_trigger_verify,
    bench_snapshot_save,
);
criterion_main!(benches);
