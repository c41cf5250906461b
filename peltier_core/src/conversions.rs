//! `From` implementations bridging `peltier_config` types to core types.

use crate::config::{ReaderCfg, SchedulerCfg};

impl From<&peltier_config::SerialCfg> for ReaderCfg {
    fn from(c: &peltier_config::SerialCfg) -> Self {
        Self {
            read_timeout_ms: c.read_timeout_ms,
            idle_sleep_ms: c.idle_sleep_ms,
        }
    }
}

impl From<&peltier_config::SchedulerCfg> for SchedulerCfg {
    fn from(c: &peltier_config::SchedulerCfg) -> Self {
        Self {
            tick_ms: c.tick_ms,
            settle_ms: c.settle_ms,
            tolerance_c: c.tolerance_c,
            lag_offset_s: c.lag_offset_s,
        }
    }
}
