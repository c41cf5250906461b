//! Session engine: connection lifecycle, manual control, profile runs.
//!
//! One engine owns at most one live link. Connecting spawns the telemetry
//! reader; starting a profile spawns a driver thread that ticks the
//! `ProfileScheduler` until it reaches a terminal status. All lifecycle
//! transitions are reported on the status channel.

use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use peltier_traits::{Clock, CommandPort, MonotonicClock, TelemetryPort};
use tracing::{info, warn};

use crate::config::{ReaderCfg, SchedulerCfg};
use crate::dispatcher::Dispatcher;
use crate::error::EngineError;
use crate::events::{ErrorKind, SchedulerEvent, StatusEvent};
use crate::logfile::SessionRecorder;
use crate::profile::{MAX_TEMP_C, MIN_TEMP_C, Profile, round_tenth};
use crate::reader::{ReaderHandle, ReaderWiring, TelemetryRecord};
use crate::scheduler::ProfileScheduler;
use crate::shared::{LinkFlags, SharedTemp};
use crate::status::{EngineState, StepStatus, StopReason};

struct Connection {
    flags: Arc<LinkFlags>,
    last_inside: SharedTemp,
    dispatcher: Arc<Dispatcher>,
    reader: ReaderHandle,
    sched_tx: Sender<SchedulerEvent>,
    sched_rx: Receiver<SchedulerEvent>,
    driver: Option<JoinHandle<()>>,
}

pub struct Engine {
    reader_cfg: ReaderCfg,
    sched_cfg: SchedulerCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    state: Arc<Mutex<EngineState>>,
    profile: Mutex<Profile>,
    recorder: Arc<Mutex<Option<SessionRecorder>>>,
    conn: Mutex<Option<Connection>>,
    status_tx: Sender<StatusEvent>,
    status_rx: Receiver<StatusEvent>,
}

impl Engine {
    pub fn new(reader_cfg: ReaderCfg, sched_cfg: SchedulerCfg) -> Self {
        Self::with_clock(reader_cfg, sched_cfg, Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(
        reader_cfg: ReaderCfg,
        sched_cfg: SchedulerCfg,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        let (status_tx, status_rx) = crossbeam_channel::unbounded();
        Self {
            reader_cfg,
            sched_cfg,
            clock,
            state: Arc::new(Mutex::new(EngineState::Idle)),
            profile: Mutex::new(Profile::new()),
            recorder: Arc::new(Mutex::new(None)),
            conn: Mutex::new(None),
            status_tx,
            status_rx,
        }
    }

    /// Lifecycle notification stream; clone freely.
    pub fn status_events(&self) -> Receiver<StatusEvent> {
        self.status_rx.clone()
    }

    pub fn state(&self) -> EngineState {
        lock(&self.state).clone()
    }

    /// Last inside temperature seen on the current link, if any.
    pub fn last_inside_temp(&self) -> Option<f32> {
        lock(&self.conn).as_ref().and_then(|c| c.last_inside.get())
    }

    /// Open a session over the given port pair, closing any existing one
    /// first. Returns the stream of parsed telemetry records.
    pub fn connect<T, C>(&self, telemetry: T, command: C) -> crate::error::Result<Receiver<TelemetryRecord>>
    where
        T: TelemetryPort + Send + 'static,
        C: CommandPort + Send + 'static,
    {
        self.disconnect();

        let flags = LinkFlags::new();
        let last_inside = SharedTemp::new();
        let (sched_tx, sched_rx) = crossbeam_channel::unbounded();
        let wiring = ReaderWiring {
            flags: Arc::clone(&flags),
            last_inside: last_inside.clone(),
            sched_tx: sched_tx.clone(),
            status_tx: self.status_tx.clone(),
            recorder: Arc::clone(&self.recorder),
        };
        let (reader, telemetry_rx) = ReaderHandle::spawn(telemetry, self.reader_cfg, wiring);
        let dispatcher = Arc::new(Dispatcher::new(Box::new(command)));

        *lock(&self.conn) = Some(Connection {
            flags,
            last_inside,
            dispatcher,
            reader,
            sched_tx,
            sched_rx,
            driver: None,
        });
        *lock(&self.state) = EngineState::Idle;
        info!("session connected");
        let _ = self.status_tx.send(StatusEvent::Connected);
        Ok(telemetry_rx)
    }

    /// Close the current session. Safe to call at any time, including with
    /// no session open; a running profile is stopped first.
    pub fn disconnect(&self) {
        let Some(mut conn) = lock(&self.conn).take() else {
            return;
        };
        let was_running = lock(&self.state).profile_active();
        conn.flags.arm_stop_suppression();
        let _ = conn.sched_tx.send(SchedulerEvent::Stop(StopReason::Disconnected));
        if let Some(driver) = conn.driver.take() {
            join_bounded(driver, self.driver_join_limit(), "profile driver");
        }
        conn.reader.stop();
        drop(conn);

        *lock(&self.state) = if was_running {
            EngineState::Stopped {
                reason: StopReason::Disconnected,
            }
        } else {
            EngineState::Idle
        };
        info!("session disconnected");
        let _ = self.status_tx.send(StatusEvent::Disconnected);
    }

    /// Command a direct setpoint. If a profile is running this cancels it
    /// (manual override) before transmitting.
    pub fn send_setpoint(&self, temp: f32) -> crate::error::Result<()> {
        let q = round_tenth(temp);
        if !q.is_finite() || !(MIN_TEMP_C..=MAX_TEMP_C).contains(&q) {
            return Err(EngineError::Validation("temperature must be between 5 and 70 °C").into());
        }
        let mut guard = lock(&self.conn);
        let conn = guard
            .as_mut()
            .ok_or(EngineError::State("not connected".into()))?;
        if conn.flags.connection_lost.load(Ordering::SeqCst) {
            return Err(EngineError::Connection("link lost".into()).into());
        }

        if lock(&self.state).profile_active() {
            // Suppression is armed first so a STOP the device echoes for the
            // aborted profile is not treated as a device abort.
            conn.flags.arm_stop_suppression();
            let _ = conn.sched_tx.send(SchedulerEvent::ManualOverride);
            // Wait for the driver to observe the override before
            // transmitting, so the manual value is the last setpoint on the
            // wire. Bounded by a few ticks; past that the driver is wedged
            // and the transmit goes out anyway.
            let deadline = Instant::now() + self.driver_join_limit();
            while lock(&self.state).profile_active() && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(1));
            }
        } else {
            *lock(&self.state) = EngineState::ManualActive;
        }
        conn.dispatcher.send_setpoint(q)?;
        Ok(())
    }

    /// Replace the engine's working profile.
    pub fn set_profile(&self, profile: Profile) {
        *lock(&self.profile) = profile;
    }

    pub fn profile(&self) -> Profile {
        lock(&self.profile).clone()
    }

    pub fn load_profile(&self, path: &Path) -> crate::error::Result<()> {
        let profile = Profile::load(path)?;
        self.set_profile(profile);
        Ok(())
    }

    pub fn save_profile(&self, path: &Path) -> crate::error::Result<()> {
        lock(&self.profile).save(path)?;
        Ok(())
    }

    /// Start transmitting the working profile. Fails if no session is open,
    /// the profile is empty, or a run is already active.
    pub fn start_profile(&self) -> crate::error::Result<()> {
        let profile = self.profile();
        if profile.is_empty() {
            return Err(EngineError::Validation("profile has no points").into());
        }
        let mut guard = lock(&self.conn);
        let conn = guard
            .as_mut()
            .ok_or(EngineError::State("not connected".into()))?;
        if conn.flags.connection_lost.load(Ordering::SeqCst) {
            return Err(EngineError::Connection("link lost".into()).into());
        }
        if lock(&self.state).profile_active() {
            return Err(EngineError::State("a profile is already running".into()).into());
        }
        if let Some(driver) = conn.driver.take() {
            join_bounded(driver, self.driver_join_limit(), "profile driver");
        }

        // Stale stop events from a previous run must not cancel this one.
        while conn.sched_rx.try_recv().is_ok() {}
        conn.flags.clear();
        conn.dispatcher.clear_last_setpoint();

        *lock(&self.state) = EngineState::Armed;
        let _ = self.status_tx.send(StatusEvent::ProfileStarted);
        info!(points = profile.len(), duration = profile.total_duration(), "profile started");

        let scheduler = ProfileScheduler::new(
            profile,
            self.sched_cfg,
            Arc::clone(&conn.dispatcher),
            conn.sched_rx.clone(),
            conn.last_inside.clone(),
            Arc::clone(&self.clock),
        );
        let driver = DriverCtx {
            scheduler,
            dispatcher: Arc::clone(&conn.dispatcher),
            state: Arc::clone(&self.state),
            status_tx: self.status_tx.clone(),
            clock: Arc::clone(&self.clock),
            tick: Duration::from_millis(self.sched_cfg.tick_ms),
            settle: Duration::from_millis(self.sched_cfg.settle_ms),
        };
        conn.driver = Some(std::thread::spawn(move || driver.run()));
        Ok(())
    }

    /// Request cancellation of the running profile; no-op when idle.
    /// Returns without waiting for the driver to wind down.
    pub fn stop_profile(&self) {
        let guard = lock(&self.conn);
        let Some(conn) = guard.as_ref() else {
            return;
        };
        if !lock(&self.state).profile_active() {
            return;
        }
        conn.flags.arm_stop_suppression();
        let _ = conn.sched_tx.send(SchedulerEvent::Stop(StopReason::UserRequested));
    }

    /// Begin appending telemetry to a session log at `path`.
    pub fn start_recording(&self, path: &Path) -> crate::error::Result<()> {
        let rec = SessionRecorder::open(path)?;
        *lock(&self.recorder) = Some(rec);
        info!(path = %path.display(), "session recording started");
        Ok(())
    }

    pub fn stop_recording(&self) {
        if lock(&self.recorder).take().is_some() {
            info!("session recording stopped");
        }
    }

    /// Longest the driver can go without checking its event queue: one tick
    /// of sleep plus headroom for an in-flight write.
    fn driver_join_limit(&self) -> Duration {
        Duration::from_millis(self.sched_cfg.tick_ms) + Duration::from_secs(1)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Everything the profile driver thread needs, detached from the engine so
/// the engine's locks stay free while the run is in flight.
struct DriverCtx {
    scheduler: ProfileScheduler,
    dispatcher: Arc<Dispatcher>,
    state: Arc<Mutex<EngineState>>,
    status_tx: Sender<StatusEvent>,
    clock: Arc<dyn Clock + Send + Sync>,
    tick: Duration,
    settle: Duration,
}

impl DriverCtx {
    fn run(mut self) {
        if let Err(e) = self.dispatcher.send_handshake() {
            self.finish_failed(e);
            return;
        }
        if let Some(reason) = self.settle_interruptibly() {
            self.finish_stopped(reason);
            return;
        }
        loop {
            match self.scheduler.step() {
                StepStatus::Running => {
                    *lock(&self.state) = EngineState::ProfileRunning {
                        virtual_time: self.scheduler.virtual_time(),
                        first_point_reached: self.scheduler.first_point_reached(),
                    };
                    self.clock.sleep(self.tick);
                }
                StepStatus::Completed => {
                    *lock(&self.state) = EngineState::Completed;
                    let _ = self.status_tx.send(StatusEvent::ProfileCompleted);
                    return;
                }
                StepStatus::Stopped(reason) => {
                    self.finish_stopped(reason);
                    return;
                }
                StepStatus::Failed(e) => {
                    self.finish_failed(e);
                    return;
                }
            }
        }
    }

    /// Wait out the post-handshake settle in tick-sized slices so a stop
    /// request still lands promptly while arming.
    fn settle_interruptibly(&mut self) -> Option<StopReason> {
        let mut remaining = self.settle;
        while !remaining.is_zero() {
            if let Some(reason) = self.scheduler.poll_stop() {
                return Some(reason);
            }
            let slice = remaining.min(self.tick);
            self.clock.sleep(slice);
            remaining -= slice;
        }
        self.scheduler.poll_stop()
    }

    fn finish_stopped(&self, reason: StopReason) {
        *lock(&self.state) = EngineState::Stopped { reason };
        let _ = self.status_tx.send(StatusEvent::ProfileStopped(reason));
    }

    fn finish_failed(&self, e: EngineError) {
        warn!(error = %e, "profile run failed");
        *lock(&self.state) = EngineState::Failed {
            error: e.to_string(),
        };
        let _ = self.status_tx.send(StatusEvent::Error {
            kind: ErrorKind::Write,
            message: e.to_string(),
        });
    }
}

/// Wait for a worker thread up to `limit`. A thread stuck past the limit
/// is detached with a warning instead of blocking the caller.
fn join_bounded(handle: JoinHandle<()>, limit: Duration, name: &str) {
    let deadline = Instant::now() + limit;
    while !handle.is_finished() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    if !handle.is_finished() {
        warn!(thread = name, "worker did not stop in time, detaching");
    } else if handle.join().is_err() {
        warn!(thread = name, "worker thread panicked");
    }
}

/// Mutex helper that shrugs off poisoning; engine state stays usable even
/// if a holder panicked.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    match m.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    }
}
