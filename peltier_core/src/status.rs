//! Engine state and the per-tick scheduler status.

use crate::error::EngineError;

/// Why a profile run (or the whole session) stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Operator pressed stop.
    UserRequested,
    /// A direct setpoint command arrived while the profile was running.
    ManualOverride,
    /// The connection was closed or lost mid-run.
    Disconnected,
    /// The device emitted an un-suppressed STOP sentinel.
    DeviceAborted,
}

/// The single authoritative engine state. Mutated only by the scheduler
/// task (and the engine on its behalf) in response to events; everyone else
/// reads snapshots.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineState {
    Idle,
    /// A manual setpoint is active; no profile is running.
    ManualActive,
    /// Handshake sent, settle delay in progress.
    Armed,
    ProfileRunning {
        virtual_time: f32,
        first_point_reached: bool,
    },
    Stopped {
        reason: StopReason,
    },
    Completed,
    Failed {
        error: String,
    },
}

impl EngineState {
    /// True while a profile run owns the stepping path.
    pub fn profile_active(&self) -> bool {
        matches!(self, Self::Armed | Self::ProfileRunning { .. })
    }
}

/// Outcome of a single scheduler tick.
#[derive(Debug)]
pub enum StepStatus {
    /// Keep ticking.
    Running,
    /// Virtual time (plus any lag offset) passed the profile end.
    Completed,
    /// Halted before completion; the reason says by whom.
    Stopped(StopReason),
    /// A command failed to transmit mid-profile.
    Failed(EngineError),
}
