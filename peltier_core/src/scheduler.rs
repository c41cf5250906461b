//! Profile scheduler: turns a `Profile` into timed setpoint commands.
//!
//! The scheduler is a pull-style state machine; the engine's driver thread
//! calls `step()` every tick. Each step drains control events, checks for
//! completion, and either holds the first point until the plant converges
//! or advances virtual time and transmits the interpolated target.
//!
//! Virtual time advances in whole seconds of wall time, measured against
//! the `Clock`; the tick rate only bounds how quickly stops and completion
//! are observed.

use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::Receiver;
use peltier_traits::Clock;
use tracing::{debug, info, warn};

use crate::config::SchedulerCfg;
use crate::dispatcher::Dispatcher;
use crate::events::SchedulerEvent;
use crate::profile::Profile;
use crate::shared::SharedTemp;
use crate::status::{StepStatus, StopReason};

/// How long the first-point hold tolerates a silent link before warning.
const SILENT_LINK_WARN_MS: u64 = 5_000;

pub struct ProfileScheduler {
    profile: Profile,
    cfg: SchedulerCfg,
    dispatcher: Arc<Dispatcher>,
    events: Receiver<SchedulerEvent>,
    last_inside: SharedTemp,
    clock: Arc<dyn Clock + Send + Sync>,
    epoch: Instant,
    virtual_time: f32,
    first_point_reached: bool,
    last_advance_ms: u64,
    silent_link_warned: bool,
}

impl ProfileScheduler {
    /// Caller guarantees a non-empty profile.
    pub fn new(
        profile: Profile,
        cfg: SchedulerCfg,
        dispatcher: Arc<Dispatcher>,
        events: Receiver<SchedulerEvent>,
        last_inside: SharedTemp,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        let epoch = clock.now();
        Self {
            profile,
            cfg,
            dispatcher,
            events,
            last_inside,
            clock,
            epoch,
            virtual_time: 0.0,
            first_point_reached: false,
            last_advance_ms: 0,
            silent_link_warned: false,
        }
    }

    pub fn virtual_time(&self) -> f32 {
        self.virtual_time
    }

    pub fn first_point_reached(&self) -> bool {
        self.first_point_reached
    }

    /// Drain pending control events without stepping; used while the settle
    /// delay is in progress.
    pub(crate) fn poll_stop(&self) -> Option<StopReason> {
        self.drain_events()
    }

    /// One scheduler tick. Termination precedence: engine-initiated stops,
    /// then manual override, then the device's STOP sentinel, then
    /// completion, then transmit failures.
    pub fn step(&mut self) -> StepStatus {
        if let Some(reason) = self.drain_events() {
            info!(?reason, "profile stopped");
            return StepStatus::Stopped(reason);
        }

        let lag = self.cfg.lag_offset_s.unwrap_or(0.0);
        if self.virtual_time + lag > self.profile.total_duration() {
            info!(virtual_time = self.virtual_time, lag, "profile completed");
            return StepStatus::Completed;
        }

        if !self.first_point_reached {
            return self.hold_first_point();
        }

        let now_ms = self.clock.ms_since(self.epoch);
        while now_ms.saturating_sub(self.last_advance_ms) >= 1_000 {
            self.virtual_time += 1.0;
            self.last_advance_ms += 1_000;
        }

        // Non-empty profile, so interp always yields a target.
        let Some(target) = self.profile.interp(self.virtual_time + lag) else {
            return StepStatus::Running;
        };
        match self.dispatcher.send_setpoint(target) {
            Ok(_) => StepStatus::Running,
            Err(e) => StepStatus::Failed(e),
        }
    }

    /// Keep commanding the first waypoint until the measured temperature is
    /// within tolerance; virtual time stands still until then. The hold
    /// never releases without a reading, so a link that stays silent is
    /// flagged once at warn level and the run waits for a stop request.
    fn hold_first_point(&mut self) -> StepStatus {
        let Some(target) = self.profile.first_temp() else {
            return StepStatus::Running;
        };
        if let Err(e) = self.dispatcher.send_setpoint(target) {
            return StepStatus::Failed(e);
        }
        match self.last_inside.get() {
            Some(inside) if (inside - target).abs() <= self.cfg.tolerance_c => {
                debug!(target, inside, "first point reached, starting timeline");
                self.first_point_reached = true;
                self.last_advance_ms = self.clock.ms_since(self.epoch);
            }
            Some(_) => {}
            None => {
                if !self.silent_link_warned
                    && self.clock.ms_since(self.epoch) >= SILENT_LINK_WARN_MS
                {
                    warn!(target, "no telemetry received, holding first point until a reading arrives");
                    self.silent_link_warned = true;
                }
            }
        }
        StepStatus::Running
    }

    /// Drain all pending control events, keeping the highest-precedence
    /// outcome. An engine-initiated stop always wins over the device's.
    fn drain_events(&self) -> Option<StopReason> {
        let mut outcome: Option<StopReason> = None;
        while let Ok(ev) = self.events.try_recv() {
            let candidate = match ev {
                SchedulerEvent::Stop(reason) => reason,
                SchedulerEvent::ManualOverride => StopReason::ManualOverride,
                SchedulerEvent::DeviceStop => StopReason::DeviceAborted,
            };
            outcome = Some(match outcome {
                None => candidate,
                Some(prev) => {
                    if rank(candidate) > rank(prev) {
                        candidate
                    } else {
                        prev
                    }
                }
            });
        }
        outcome
    }
}

fn rank(reason: StopReason) -> u8 {
    match reason {
        StopReason::Disconnected => 3,
        StopReason::UserRequested => 2,
        StopReason::ManualOverride => 1,
        StopReason::DeviceAborted => 0,
    }
}
