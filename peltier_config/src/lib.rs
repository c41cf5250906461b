#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas for the Peltier controller host.
//!
//! `Config` and sub-structs are deserialized from TOML and validated. The
//! schema covers the serial link, the profile scheduler, and logging; every
//! section has sensible defaults so an absent config file still yields a
//! usable configuration.
use serde::Deserialize;

/// Serial link parameters.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct SerialCfg {
    /// Line rate; the controller firmware speaks 115200 8N1.
    pub baud: u32,
    /// Blocking read timeout per chunk (ms).
    pub read_timeout_ms: u64,
    /// Write timeout per command (ms).
    pub write_timeout_ms: u64,
    /// Idle sleep when a read returns no bytes (ms).
    pub idle_sleep_ms: u64,
}

impl Default for SerialCfg {
    fn default() -> Self {
        Self {
            baud: 115_200,
            read_timeout_ms: 1_000,
            write_timeout_ms: 500,
            idle_sleep_ms: 10,
        }
    }
}

/// Profile scheduler parameters.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct SchedulerCfg {
    /// Termination-check tick (ms). Virtual time advances once per elapsed
    /// second regardless of this value; the tick only bounds cancellation
    /// latency.
    pub tick_ms: u64,
    /// Settle delay after the `Profile` handshake before stepping begins (ms).
    pub settle_ms: u64,
    /// First-point convergence band (°C). 0.0 requires an exact match.
    pub tolerance_c: f32,
    /// Optional lag-compensation offset (s). Absent disables compensation.
    pub lag_offset_s: Option<f32>,
}

impl Default for SchedulerCfg {
    fn default() -> Self {
        Self {
            tick_ms: 25,
            settle_ms: 1_000,
            tolerance_c: 0.5,
            lag_offset_s: None,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    /// Path to a log file (JSON lines); console only when absent.
    pub file: Option<String>,
    /// "error" | "warn" | "info" | "debug" | "trace"
    pub level: Option<String>,
    /// Log as JSON lines instead of pretty console output.
    pub json: bool,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub serial: SerialCfg,
    pub scheduler: SchedulerCfg,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Serial
        if self.serial.baud == 0 {
            eyre::bail!("serial.baud must be > 0");
        }
        if self.serial.read_timeout_ms == 0 {
            eyre::bail!("serial.read_timeout_ms must be >= 1");
        }
        if self.serial.write_timeout_ms == 0 {
            eyre::bail!("serial.write_timeout_ms must be >= 1");
        }
        if self.serial.idle_sleep_ms == 0 {
            eyre::bail!("serial.idle_sleep_ms must be >= 1");
        }
        if self.serial.idle_sleep_ms > 1_000 {
            eyre::bail!("serial.idle_sleep_ms is unreasonably large (>1s)");
        }

        // Scheduler
        if self.scheduler.tick_ms == 0 || self.scheduler.tick_ms > 1_000 {
            eyre::bail!("scheduler.tick_ms must be in [1, 1000]");
        }
        if self.scheduler.settle_ms > 60_000 {
            eyre::bail!("scheduler.settle_ms is unreasonably large (>60s)");
        }
        if !self.scheduler.tolerance_c.is_finite() || self.scheduler.tolerance_c < 0.0 {
            eyre::bail!("scheduler.tolerance_c must be finite and >= 0");
        }
        if let Some(lag) = self.scheduler.lag_offset_s
            && (!lag.is_finite() || lag < 0.0)
        {
            eyre::bail!("scheduler.lag_offset_s must be finite and >= 0");
        }

        Ok(())
    }
}
