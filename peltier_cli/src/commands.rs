//! Command implementations: session assembly and the interactive loops.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, select};
use eyre::{Result, WrapErr, bail, eyre};
use peltier_core::{Engine, ErrorKind, Profile, StatusEvent, StopReason, TelemetryRecord};
use peltier_hardware::SerialLink;
use peltier_hardware::sim::{SimHandle, SimulatedDevice};
use tracing::warn;

use crate::cli::JSON_MODE;

/// Emission period of the simulated device, matching real firmware cadence.
const SIM_PERIOD: Duration = Duration::from_secs(1);

fn json_mode() -> bool {
    JSON_MODE.get().copied().unwrap_or(false)
}

pub fn ports() -> Result<()> {
    let names = peltier_hardware::available_ports().wrap_err("failed to enumerate ports")?;
    if json_mode() {
        println!("{}", serde_json::json!({ "ports": names }));
    } else if names.is_empty() {
        println!("no serial ports found");
    } else {
        for name in names {
            println!("{name}");
        }
    }
    Ok(())
}

fn build_engine(cfg: &peltier_config::Config, lag_override: Option<f32>) -> Result<Engine> {
    let reader = peltier_core::ReaderCfg::from(&cfg.serial);
    let mut sched = peltier_core::SchedulerCfg::from(&cfg.scheduler);
    if let Some(lag) = lag_override {
        if !lag.is_finite() || lag < 0.0 {
            bail!("--lag-offset-s must be finite and >= 0");
        }
        sched.lag_offset_s = Some(lag);
    }
    Ok(Engine::new(reader, sched))
}

/// Open the requested link and hand its halves to the engine. The returned
/// `SimHandle` keeps the simulated device alive for the session.
fn open_session(
    engine: &Engine,
    cfg: &peltier_config::Config,
    port: Option<&str>,
    sim: bool,
) -> Result<(Receiver<TelemetryRecord>, Option<SimHandle>)> {
    if sim {
        let (telemetry, command, handle) = SimulatedDevice::spawn(SIM_PERIOD);
        let rx = engine.connect(telemetry, command)?;
        return Ok((rx, Some(handle)));
    }
    let name = port.ok_or_else(|| eyre!("either --port or --sim is required"))?;
    let (reader, writer) = SerialLink::open(
        name,
        cfg.serial.baud,
        Duration::from_millis(cfg.serial.read_timeout_ms),
        Duration::from_millis(cfg.serial.write_timeout_ms),
    )?;
    let rx = engine.connect(reader, writer)?;
    Ok((rx, None))
}

fn shutdown_flag() -> Result<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&flag);
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    })
    .wrap_err("failed to install Ctrl-C handler")?;
    Ok(flag)
}

fn print_record(rec: &TelemetryRecord) {
    if json_mode() {
        println!(
            "{}",
            serde_json::json!({
                "received_at": rec.received_at.to_rfc3339(),
                "inside_temp": rec.inside_temp,
                "outside_temp": rec.outside_temp,
                "set_temp": rec.set_temp,
            })
        );
    } else {
        let stamp = rec.received_at.format("%H:%M:%S");
        match rec.set_temp {
            Some(set) => println!(
                "[{stamp}] inside {:.1} °C  outside {:.1} °C  set {:.1} °C",
                rec.inside_temp, rec.outside_temp, set
            ),
            None => println!(
                "[{stamp}] inside {:.1} °C  outside {:.1} °C",
                rec.inside_temp, rec.outside_temp
            ),
        }
    }
}

pub fn monitor(
    cfg: &peltier_config::Config,
    port: Option<&str>,
    sim: bool,
    record: Option<&Path>,
) -> Result<()> {
    let engine = build_engine(cfg, None)?;
    let status = engine.status_events();
    let (telemetry, _sim) = open_session(&engine, cfg, port, sim)?;
    if let Some(path) = record {
        engine.start_recording(path)?;
    }
    let shutdown = shutdown_flag()?;

    let mut link_lost = false;
    while !shutdown.load(Ordering::SeqCst) {
        select! {
            recv(telemetry) -> rec => match rec {
                Ok(rec) => print_record(&rec),
                Err(_) => break,
            },
            recv(status) -> ev => match ev {
                Ok(StatusEvent::Error { kind: ErrorKind::Connection, message }) => {
                    warn!(%message, "link lost");
                    link_lost = true;
                    break;
                }
                Ok(_) | Err(_) => {}
            },
            default(Duration::from_millis(200)) => {}
        }
    }

    engine.stop_recording();
    engine.disconnect();
    if link_lost {
        bail!("connection lost");
    }
    Ok(())
}

pub fn send(cfg: &peltier_config::Config, port: Option<&str>, sim: bool, temp: f32) -> Result<()> {
    let engine = build_engine(cfg, None)?;
    let (_telemetry, _sim) = open_session(&engine, cfg, port, sim)?;
    engine.send_setpoint(temp)?;
    if json_mode() {
        println!("{}", serde_json::json!({ "setpoint": temp, "sent": true }));
    } else {
        println!("setpoint {temp:.1} °C transmitted");
    }
    engine.disconnect();
    Ok(())
}

enum RunOutcome {
    Completed,
    Stopped(StopReason),
    Failed(String),
}

pub fn run(
    cfg: &peltier_config::Config,
    port: Option<&str>,
    sim: bool,
    profile_path: &Path,
    lag_offset_s: Option<f32>,
    record: Option<&Path>,
) -> Result<()> {
    let engine = build_engine(cfg, lag_offset_s)?;
    let status = engine.status_events();
    let (telemetry, _sim) = open_session(&engine, cfg, port, sim)?;

    let profile = Profile::load(profile_path)
        .wrap_err_with(|| format!("failed to load {}", profile_path.display()))?;
    engine.set_profile(profile);
    if let Some(path) = record {
        engine.start_recording(path)?;
    }
    let shutdown = shutdown_flag()?;

    engine.start_profile()?;
    let mut telemetry = telemetry;
    let mut stop_requested = false;
    let outcome = loop {
        if shutdown.load(Ordering::SeqCst) && !stop_requested {
            engine.stop_profile();
            stop_requested = true;
        }
        select! {
            recv(telemetry) -> rec => match rec {
                Ok(rec) => print_record(&rec),
                // Reader gone; the stop surfaces on the status channel.
                Err(_) => telemetry = crossbeam_channel::never(),
            },
            recv(status) -> ev => match ev {
                Ok(StatusEvent::ProfileCompleted) => break RunOutcome::Completed,
                Ok(StatusEvent::ProfileStopped(reason)) => break RunOutcome::Stopped(reason),
                Ok(StatusEvent::Error { kind: ErrorKind::Recording, message }) => {
                    warn!(%message, "recording disabled");
                }
                Ok(StatusEvent::Error { message, .. }) => break RunOutcome::Failed(message),
                Ok(_) => {}
                Err(_) => break RunOutcome::Failed("status channel closed".to_string()),
            },
            default(Duration::from_millis(100)) => {}
        }
    };

    engine.stop_recording();
    engine.disconnect();
    match outcome {
        RunOutcome::Completed => {
            println!("profile completed");
            Ok(())
        }
        RunOutcome::Stopped(StopReason::UserRequested) => {
            println!("profile stopped");
            Ok(())
        }
        RunOutcome::Stopped(StopReason::ManualOverride) => {
            println!("profile stopped by manual override");
            Ok(())
        }
        RunOutcome::Stopped(StopReason::DeviceAborted) => bail!("device aborted the profile"),
        RunOutcome::Stopped(StopReason::Disconnected) => bail!("connection lost during profile"),
        RunOutcome::Failed(msg) => bail!("profile failed: {msg}"),
    }
}

pub fn view(log: &Path, profile: Option<&Path>, start_offset_s: Option<f32>) -> Result<()> {
    let session = peltier_core::logread::SessionLog::load(log)
        .wrap_err_with(|| format!("failed to parse {}", log.display()))?;

    if json_mode() {
        for r in &session.records {
            println!(
                "{}",
                serde_json::json!({
                    "elapsed_s": r.elapsed_s,
                    "inside_temp": r.inside_temp,
                    "outside_temp": r.outside_temp,
                    "set_temp": r.set_temp,
                })
            );
        }
    } else {
        for r in &session.records {
            match r.set_temp {
                Some(set) => println!(
                    "{:>8.1}s  inside {:.1} °C  outside {:.1} °C  set {:.1} °C",
                    r.elapsed_s, r.inside_temp, r.outside_temp, set
                ),
                None => println!(
                    "{:>8.1}s  inside {:.1} °C  outside {:.1} °C",
                    r.elapsed_s, r.inside_temp, r.outside_temp
                ),
            }
        }
        println!(
            "{} records over {:.0}s ({} unparsed lines skipped)",
            session.records.len(),
            session.duration_s(),
            session.skipped
        );
    }

    if let (Some(profile_path), Some(offset)) = (profile, start_offset_s) {
        let profile = Profile::load(profile_path)
            .wrap_err_with(|| format!("failed to load {}", profile_path.display()))?;
        let overlay = peltier_core::logread::profile_overlay(&profile, offset);
        if json_mode() {
            let points: Vec<_> = overlay
                .iter()
                .map(|(t, v)| serde_json::json!({ "elapsed_s": t, "target_temp": v }))
                .collect();
            println!("{}", serde_json::json!({ "profile_overlay": points }));
        } else {
            println!("profile overlay (started at {offset:.0}s):");
            for (t, v) in overlay {
                println!("{t:>8.1}s  target {v:.1} °C");
            }
        }
    }
    Ok(())
}
