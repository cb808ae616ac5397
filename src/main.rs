//! meterlog - History log scenario runner
//!
//! Drives a simulated meter through fill, overflow, interval generation,
//! power cycle and delete, checking the meter against the reference model
//! after every phase.

use chrono::Duration;
use meterlog_device::{Config, HistoryLogClient, InstanceId, SimulatedMeter, VerifyReport};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration (from file if METERLOG_CONFIG is set, then env overrides)
    let config = match Config::load() {
        Ok(c) => {
            if let Ok(path) = std::env::var("METERLOG_CONFIG") {
                tracing::info!("Loaded config from {}", path);
            }
            c
        }
        Err(e) => {
            // If a config file was explicitly specified, fail on error
            if std::env::var("METERLOG_CONFIG").is_ok() {
                tracing::error!("Failed to load config: {}", e);
                return Err(e.into());
            }
            tracing::info!("Using default configuration");
            Config::default()
        }
    };

    let defaults = config.log.to_log_config()?;
    tracing::info!("Starting meterlog scenario");
    tracing::info!("  Capacity: {}", defaults.capacity);
    tracing::info!("  Interval: {}", defaults.interval);
    tracing::info!("  Dataset: {}", defaults.selector);
    match config.storage.snapshots_dir() {
        Some(dir) => tracing::info!("  Snapshot directory: {}", dir.display()),
        None => tracing::info!("  Snapshots: disabled"),
    }

    let meter = SimulatedMeter::from_config(&config)?;
    let model = meter.log(InstanceId::Primary);
    let mut client = HistoryLogClient::new(&meter, InstanceId::Primary, model);
    check("startup", client.verify_all()?)?;

    if !client.model().is_enabled() {
        client.configure(defaults)?;
    }

    // Fill past capacity so the ring wraps
    let fill = client.model().capacity() as u32 + 1;
    for n in 0..fill {
        meter.update_live(|live| {
            live.sum_volume = live.sum_volume.wrapping_add(10);
            live.forward_volume = live.forward_volume.wrapping_add(10);
            live.current_flow = (n % 200) as i32 - 100;
            live.operating_hours = n;
        });
        client.trigger()?;
    }
    tracing::info!(
        entries = client.model().count(),
        status = ?client.model().status(),
        "log filled"
    );
    check("fill", client.verify()?)?;

    // Cross one hourly and one daily boundary
    let now = meter.clock();
    for step in [Duration::hours(1), Duration::days(1)] {
        let generated = client.set_clock(now + step)?;
        tracing::info!(
            clock = %(now + step),
            generated = generated.is_some(),
            "clock advanced"
        );
    }
    check("interval", client.verify_all()?)?;

    client.reset()?;
    check("power cycle", client.verify_all()?)?;

    client.delete()?;
    check("delete", client.verify_all()?)?;

    tracing::info!(resets = meter.reset_count(), "scenario complete");
    Ok(())
}

fn check(phase: &str, report: VerifyReport) -> Result<(), Box<dyn std::error::Error>> {
    if report.is_consistent() {
        tracing::info!("{}: meter matches model", phase);
        return Ok(());
    }
    for divergence in &report.divergences {
        tracing::error!("{}: {}", phase, divergence);
    }
    Err(format!(
        "{}: {} divergence(s) between meter and model",
        phase,
        report.divergences.len()
    )
    .into())
}
