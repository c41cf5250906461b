#![allow(clippy::unwrap_used)]
//! In-memory port doubles for tests. Kept in the library (not behind
//! `cfg(test)`) so integration tests and downstream harnesses can drive the
//! engine without hardware.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use peltier_traits::{CommandPort, TelemetryPort};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Telemetry source fed line-by-line from the test. Blocks (up to the read
/// timeout) until a line is injected; a dropped `ScriptedFeed` reads as a
/// broken link.
pub struct ScriptedPort {
    rx: Receiver<Vec<u8>>,
    pending: VecDeque<u8>,
}

/// Test-side handle that injects raw bytes into a `ScriptedPort`.
#[derive(Clone)]
pub struct ScriptedFeed {
    tx: Sender<Vec<u8>>,
}

impl ScriptedPort {
    pub fn new() -> (Self, ScriptedFeed) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (
            Self {
                rx,
                pending: VecDeque::new(),
            },
            ScriptedFeed { tx },
        )
    }
}

impl ScriptedFeed {
    /// Queue a complete line, terminator included.
    pub fn inject_line(&self, line: &str) {
        let mut bytes = line.as_bytes().to_vec();
        bytes.push(b'\n');
        let _ = self.tx.send(bytes);
    }

    pub fn inject_raw(&self, bytes: &[u8]) {
        let _ = self.tx.send(bytes.to_vec());
    }
}

impl TelemetryPort for ScriptedPort {
    fn read_chunk(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, BoxError> {
        if self.pending.is_empty() {
            match self.rx.recv_timeout(timeout) {
                Ok(bytes) => self.pending.extend(bytes),
                Err(RecvTimeoutError::Timeout) => return Ok(0),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(Box::new(io::Error::new(
                        io::ErrorKind::BrokenPipe,
                        "scripted link closed",
                    )));
                }
            }
        }
        let n = buf.len().min(self.pending.len());
        for slot in buf.iter_mut().take(n) {
            *slot = self.pending.pop_front().unwrap();
        }
        Ok(n)
    }
}

/// Command sink that captures every transmitted line and can fail the next
/// write on demand.
#[derive(Clone)]
pub struct RecordingPort {
    lines: Arc<Mutex<Vec<String>>>,
    fail_next: Arc<AtomicBool>,
}

impl RecordingPort {
    pub fn new() -> (Self, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                lines: Arc::clone(&lines),
                fail_next: Arc::new(AtomicBool::new(false)),
            },
            lines,
        )
    }

    /// The next `send_line` fails once, then writes succeed again.
    pub fn fail_next_write(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

impl CommandPort for RecordingPort {
    fn send_line(&mut self, line: &str) -> Result<(), BoxError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(Box::new(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "injected write failure",
            )));
        }
        self.lines.lock().unwrap().push(line.to_string());
        Ok(())
    }
}

/// Telemetry port that never produces data.
pub struct SilentPort;

impl TelemetryPort for SilentPort {
    fn read_chunk(&mut self, _buf: &mut [u8], timeout: Duration) -> Result<usize, BoxError> {
        std::thread::sleep(timeout.min(Duration::from_millis(5)));
        Ok(0)
    }
}
