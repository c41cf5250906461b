//! Outbound command path: setpoints and the profile handshake.
//!
//! All writers (manual control, scheduler) share one `Dispatcher`, which is
//! where setpoint quantization and duplicate suppression live. The device
//! reacts to every line it receives, so a repeated setpoint is skipped
//! rather than re-sent.

use std::sync::Mutex;

use peltier_traits::CommandPort;
use tracing::{debug, trace};

use crate::error::EngineError;
use crate::hw_error::map_write_error;
use crate::profile::round_tenth;

/// Line that arms the device's profile mode.
const HANDSHAKE: &str = "Profile";

pub struct Dispatcher {
    port: Mutex<Box<dyn CommandPort + Send>>,
    last_setpoint: Mutex<Option<f32>>,
}

impl Dispatcher {
    pub fn new(port: Box<dyn CommandPort + Send>) -> Self {
        Self {
            port: Mutex::new(port),
            last_setpoint: Mutex::new(None),
        }
    }

    /// Quantize to 0.1 °C and transmit, unless it matches the last setpoint
    /// successfully sent. Returns whether a line actually went out. The
    /// last-sent value only advances on a successful write.
    pub fn send_setpoint(&self, temp: f32) -> Result<bool, EngineError> {
        let q = round_tenth(temp);
        let mut last = self.lock_last();
        if *last == Some(q) {
            trace!(setpoint = q, "setpoint unchanged, skipping");
            return Ok(false);
        }
        let line = format!("{q:.1}");
        self.write_line(&line)?;
        debug!(setpoint = q, "setpoint transmitted");
        *last = Some(q);
        Ok(true)
    }

    /// Transmit the profile-mode handshake. Not a setpoint, so duplicate
    /// tracking is untouched.
    pub fn send_handshake(&self) -> Result<(), EngineError> {
        self.write_line(HANDSHAKE)?;
        debug!("profile handshake transmitted");
        Ok(())
    }

    /// Forget the last-sent setpoint so the next command always transmits.
    /// Called when the device's state can no longer be assumed (reconnect,
    /// profile start).
    pub fn clear_last_setpoint(&self) {
        *self.lock_last() = None;
    }

    pub fn last_setpoint(&self) -> Option<f32> {
        *self.lock_last()
    }

    fn write_line(&self, line: &str) -> Result<(), EngineError> {
        let mut port = match self.port.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        port.send_line(line).map_err(map_write_error)
    }

    fn lock_last(&self) -> std::sync::MutexGuard<'_, Option<f32>> {
        match self.last_setpoint.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::RecordingPort;

    #[test]
    fn duplicate_setpoints_are_suppressed() {
        let (port, lines) = RecordingPort::new();
        let d = Dispatcher::new(Box::new(port));
        assert!(d.send_setpoint(20.04).expect("send"));
        assert!(!d.send_setpoint(20.0).expect("send"));
        assert!(!d.send_setpoint(19.99).expect("send"));
        assert!(d.send_setpoint(20.1).expect("send"));
        assert_eq!(*lines.lock().unwrap(), vec!["20.0", "20.1"]);
    }

    #[test]
    fn handshake_does_not_disturb_dedup() {
        let (port, lines) = RecordingPort::new();
        let d = Dispatcher::new(Box::new(port));
        d.send_setpoint(25.0).expect("send");
        d.send_handshake().expect("handshake");
        assert!(!d.send_setpoint(25.0).expect("send"));
        assert_eq!(*lines.lock().unwrap(), vec!["25.0", "Profile"]);
    }

    #[test]
    fn failed_write_does_not_advance_last_setpoint() {
        let (port, lines) = RecordingPort::new();
        port.fail_next_write();
        let d = Dispatcher::new(Box::new(port));
        assert!(d.send_setpoint(20.0).is_err());
        // Retry after the fault goes out despite matching the failed value.
        assert!(d.send_setpoint(20.0).expect("retry"));
        assert_eq!(*lines.lock().unwrap(), vec!["20.0"]);
    }

    #[test]
    fn clear_forces_retransmission() {
        let (port, lines) = RecordingPort::new();
        let d = Dispatcher::new(Box::new(port));
        d.send_setpoint(30.0).expect("send");
        d.clear_last_setpoint();
        assert!(d.send_setpoint(30.0).expect("send"));
        assert_eq!(*lines.lock().unwrap(), vec!["30.0", "30.0"]);
    }
}
