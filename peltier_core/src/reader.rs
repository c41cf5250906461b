//! Background telemetry reader.
//!
//! Owns the receive half of the serial link on a dedicated thread: pulls raw
//! chunks, reassembles newline-terminated lines, and turns them into
//! `TelemetryRecord`s. Lines that are not telemetry are either the STOP
//! sentinel (routed to the scheduler, unless a suppression is armed) or
//! noise, which is logged at trace level and dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use crossbeam_channel::{Receiver, Sender};
use peltier_traits::TelemetryPort;
use tracing::{debug, trace, warn};

use crate::config::ReaderCfg;
use crate::events::{ErrorKind, SchedulerEvent, StatusEvent};
use crate::hw_error::map_read_error;
use crate::logfile::SessionRecorder;
use crate::shared::{LinkFlags, SharedTemp};

/// One parsed telemetry line.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    pub received_at: DateTime<Local>,
    pub inside_temp: f32,
    pub outside_temp: f32,
    /// Device-echoed setpoint; absent in legacy two-field session logs.
    pub set_temp: Option<f32>,
}

/// Channels and shared state the reader feeds.
pub struct ReaderWiring {
    pub flags: Arc<LinkFlags>,
    pub last_inside: SharedTemp,
    pub sched_tx: Sender<SchedulerEvent>,
    pub status_tx: Sender<StatusEvent>,
    pub recorder: Arc<Mutex<Option<SessionRecorder>>>,
}

/// Handle to the reader thread; signals shutdown and joins on drop.
pub struct ReaderHandle {
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
    read_timeout: Duration,
}

impl ReaderHandle {
    /// Spawn the reader over `port`. Returns the handle and the telemetry
    /// stream; records arrive in line order.
    pub fn spawn<P>(mut port: P, cfg: ReaderCfg, wiring: ReaderWiring) -> (Self, Receiver<TelemetryRecord>)
    where
        P: TelemetryPort + Send + 'static,
    {
        let (tx, rx) = crossbeam_channel::unbounded();
        let shutdown = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&shutdown);
        let read_timeout = Duration::from_millis(cfg.read_timeout_ms);
        let idle_sleep = Duration::from_millis(cfg.idle_sleep_ms);

        let join = std::thread::spawn(move || {
            let mut chunk = [0u8; 256];
            let mut acc: Vec<u8> = Vec::with_capacity(256);
            while !stop.load(Ordering::SeqCst) {
                match port.read_chunk(&mut chunk, read_timeout) {
                    Ok(0) => std::thread::sleep(idle_sleep),
                    Ok(n) => {
                        acc.extend_from_slice(&chunk[..n]);
                        drain_lines(&mut acc, &wiring, &tx);
                    }
                    Err(e) => {
                        let err = map_read_error(e);
                        warn!(error = %err, "telemetry read failed, closing link");
                        wiring.flags.connection_lost.store(true, Ordering::SeqCst);
                        let _ = wiring.status_tx.send(StatusEvent::Error {
                            kind: ErrorKind::Connection,
                            message: err.to_string(),
                        });
                        let _ = wiring
                            .sched_tx
                            .send(SchedulerEvent::Stop(crate::status::StopReason::Disconnected));
                        break;
                    }
                }
            }
        });

        (
            Self {
                shutdown,
                join: Some(join),
                read_timeout,
            },
            rx,
        )
    }

    /// Signal shutdown and wait for the thread, bounded by one read timeout
    /// plus margin. A thread stuck past that is detached with a warning.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            let deadline = Instant::now() + self.read_timeout + Duration::from_millis(200);
            while !join.is_finished() && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(5));
            }
            if join.is_finished() {
                let _ = join.join();
            } else {
                warn!("telemetry reader did not shut down in time, detaching");
            }
        }
    }
}

impl Drop for ReaderHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Split accumulated bytes into complete lines and dispatch each.
fn drain_lines(acc: &mut Vec<u8>, wiring: &ReaderWiring, tx: &Sender<TelemetryRecord>) {
    while let Some(pos) = acc.iter().position(|&b| b == b'\n') {
        let line: Vec<u8> = acc.drain(..=pos).collect();
        let text = String::from_utf8_lossy(&line);
        handle_line(text.trim(), wiring, tx);
    }
}

fn handle_line(line: &str, wiring: &ReaderWiring, tx: &Sender<TelemetryRecord>) {
    if line.is_empty() {
        return;
    }
    if line == "STOP" {
        if wiring.flags.consume_stop_suppression() {
            debug!("suppressed echoed STOP sentinel");
        } else {
            let _ = wiring.sched_tx.send(SchedulerEvent::DeviceStop);
        }
        return;
    }
    let Some((inside, outside, set)) = parse_telemetry(line) else {
        trace!(%line, "discarding non-telemetry line");
        return;
    };
    let record = TelemetryRecord {
        received_at: Local::now(),
        inside_temp: inside,
        outside_temp: outside,
        set_temp: Some(set),
    };
    wiring.last_inside.set(inside);
    record_session(&record, wiring);
    // Receiver may have gone away mid-teardown; the reader keeps draining
    // the port until told to stop.
    let _ = tx.send(record);
}

/// Parse `inside, outside, set` as three comma-separated floats.
pub fn parse_telemetry(line: &str) -> Option<(f32, f32, f32)> {
    let mut it = line.split(',').map(str::trim);
    let inside: f32 = it.next()?.parse().ok()?;
    let outside: f32 = it.next()?.parse().ok()?;
    let set: f32 = it.next()?.parse().ok()?;
    if it.next().is_some() {
        return None;
    }
    Some((inside, outside, set))
}

/// Append to the active session log, if any. A write failure disables
/// recording for the rest of the session rather than killing the reader.
fn record_session(record: &TelemetryRecord, wiring: &ReaderWiring) {
    let mut guard = match wiring.recorder.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    };
    if let Some(rec) = guard.as_mut()
        && let Err(e) = rec.write_record(record)
    {
        warn!(error = %e, path = %rec.path().display(), "session log write failed, recording disabled");
        let _ = wiring.status_tx.send(StatusEvent::Error {
            kind: ErrorKind::Recording,
            message: format!("session log write failed: {e}"),
        });
        *guard = None;
    }
}
