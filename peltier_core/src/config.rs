//! Core-side configuration structs.
//!
//! Mirrors of the `peltier_config` schema types, owned here so the engine
//! has no hard dependency on the TOML layer; `conversions` bridges the two.

/// Telemetry reader tuning.
#[derive(Debug, Clone, Copy)]
pub struct ReaderCfg {
    /// Blocking read timeout per chunk (ms).
    pub read_timeout_ms: u64,
    /// Idle sleep when a read returns no bytes (ms).
    pub idle_sleep_ms: u64,
}

impl Default for ReaderCfg {
    fn default() -> Self {
        Self {
            read_timeout_ms: 1_000,
            idle_sleep_ms: 10,
        }
    }
}

/// Profile scheduler tuning.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerCfg {
    /// Termination-check tick (ms); bounds cancellation latency, does not
    /// define profile progress.
    pub tick_ms: u64,
    /// Settle delay after the handshake before stepping begins (ms).
    pub settle_ms: u64,
    /// First-point convergence band (°C); 0.0 requires an exact match.
    pub tolerance_c: f32,
    /// Optional lag-compensation offset (s).
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
