#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Serial telemetry and profile-transmission engine (hardware-agnostic).
//!
//! This crate drives a Peltier temperature controller over a line-oriented
//! serial protocol. All port interactions go through the
//! `peltier_traits::TelemetryPort` and `peltier_traits::CommandPort` traits.
//!
//! ## Architecture
//!
//! - **Engine**: session lifecycle and the public API (`engine` module)
//! - **Reader**: background line reassembly and parsing (`reader` module)
//! - **Dispatcher**: setpoint quantization and dedup (`dispatcher` module)
//! - **Scheduler**: profile state machine with virtual time, first-point
//!   convergence and lag compensation (`scheduler` module)
//! - **Profiles**: validated waypoint sequences and interpolation
//!   (`profile` module)
//! - **Session logs**: recording (`logfile`) and offline replay (`logread`)

pub mod config;
mod conversions;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod events;
pub mod hw_error;
pub mod logfile;
pub mod logread;
pub mod mocks;
pub mod profile;
pub mod reader;
pub mod scheduler;
pub mod shared;
pub mod status;

pub use config::{ReaderCfg, SchedulerCfg};
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use events::{ErrorKind, SchedulerEvent, StatusEvent};
pub use profile::{MAX_TEMP_C, MIN_TEMP_C, Profile, ProfilePoint};
pub use reader::TelemetryRecord;
pub use status::{EngineState, StopReason};
