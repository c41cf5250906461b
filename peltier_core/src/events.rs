//! Events crossing task boundaries.
//!
//! `SchedulerEvent` feeds the profile scheduler's event queue;
//! `StatusEvent` is the single engine-to-presentation channel.

use crate::status::StopReason;

/// Control events consumed by the scheduler at every tick boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// Engine-initiated stop (user, disconnect). The engine sets
    /// SuppressNextStop before sending this.
    Stop(StopReason),
    /// A direct setpoint command arrived while running.
    ManualOverride,
    /// The reader saw an un-suppressed STOP sentinel.
    DeviceStop,
}

/// Error category attached to surfaced `StatusEvent::Error`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connection,
    Write,
    Parse,
    Validation,
    Recording,
}

/// Lifecycle notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    Connected,
    Disconnected,
    ProfileStarted,
    ProfileStopped(StopReason),
    ProfileCompleted,
    Error { kind: ErrorKind, message: String },
}
