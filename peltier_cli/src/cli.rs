//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured output mode).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "peltier", version, about = "Peltier controller host CLI")]
pub struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE", default_value = "etc/peltier_config.toml")]
    pub config: PathBuf,

    /// Print records and results as JSON lines instead of text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List serial ports visible to the OS
    Ports,
    /// Stream live telemetry until interrupted
    Monitor {
        /// Serial port to open (e.g. /dev/ttyUSB0)
        #[arg(long, value_name = "PORT", conflicts_with = "sim")]
        port: Option<String>,
        /// Use the in-process simulated device instead of hardware
        #[arg(long, action = ArgAction::SetTrue)]
        sim: bool,
        /// Append telemetry to a session log file
        #[arg(long, value_name = "FILE")]
        record: Option<PathBuf>,
    },
    /// Transmit a single setpoint and exit
    Send {
        #[arg(long, value_name = "PORT", conflicts_with = "sim")]
        port: Option<String>,
        #[arg(long, action = ArgAction::SetTrue)]
        sim: bool,
        /// Target temperature in °C (5..=70, 0.1 resolution)
        #[arg(long, value_name = "TEMP")]
        temp: f32,
    },
    /// Run a temperature profile to completion (Ctrl-C stops it cleanly)
    Run {
        #[arg(long, value_name = "PORT", conflicts_with = "sim")]
        port: Option<String>,
        #[arg(long, action = ArgAction::SetTrue)]
        sim: bool,
        /// Profile file: one `time,temperature` pair per line
        #[arg(long, value_name = "FILE")]
        profile: PathBuf,
        /// Override the configured lag-compensation offset (seconds)
        #[arg(long = "lag-offset-s", value_name = "SECONDS")]
        lag_offset_s: Option<f32>,
        /// Append telemetry to a session log file during the run
        #[arg(long, value_name = "FILE")]
        record: Option<PathBuf>,
    },
    /// Replay a recorded session log
    View {
        /// Session log file to parse
        #[arg(long, value_name = "FILE")]
        log: PathBuf,
        /// Overlay a profile's waypoints onto the session time axis
        #[arg(long, value_name = "FILE", requires = "start_offset_s")]
        profile: Option<PathBuf>,
        /// Seconds into the session at which the profile was started
        #[arg(long = "start-offset-s", value_name = "SECONDS")]
        start_offset_s: Option<f32>,
    },
}
