//! meterlog-cli - Command-line interface for meterlog
//!
//! Decodes history-log entries, timestamps, selectors and interval codes
//! captured from a meter.

mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "meterlog-cli")]
#[command(about = "Inspect meter history-log data")]
#[command(version)]
struct Cli {
    /// Print machine-readable JSON instead of text
    #[arg(long, global = true, env = "METERLOG_JSON")]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Decode one raw history-log entry
    Decode {
        /// Dataset: `ALL`, a hex mask (`0xFF1F`) or comma-separated field names
        #[arg(short, long, default_value = "ALL")]
        dataset: String,

        /// Entry bytes in hex, spaces allowed
        hex: String,

        /// Fail on out-of-range timestamps instead of flagging them
        #[arg(long)]
        strict: bool,
    },

    /// Decode a type F (4 bytes) or type G (2 bytes) timestamp, or encode one
    Timestamp {
        /// Timestamp bytes in hex
        #[arg(required_unless_present = "encode")]
        hex: Option<String>,

        /// Encode `YYYY-MM-DDTHH:MM:SS` as type F and type G instead
        #[arg(long, conflicts_with = "hex")]
        encode: Option<String>,
    },

    /// Show the mask and wire bytes of a dataset
    Selector {
        /// Dataset: `ALL`, a hex mask (`0xFF1F`) or comma-separated field names
        dataset: String,
    },

    /// Show the entry layout of a dataset
    Layout {
        /// Dataset: `ALL`, a hex mask (`0xFF1F`) or comma-separated field names
        #[arg(default_value = "ALL")]
        dataset: String,
    },

    /// Show an interval selector by name (`hourly`) or code (`0x0C00`)
    Interval {
        /// Interval name or hex code
        value: String,
    },

    /// List the field catalog
    Fields,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match commands::execute(cli.command, cli.json) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    }
}
