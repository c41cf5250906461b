use thiserror::Error;

/// Typed engine failures; see the taxonomy on each variant.
#[derive(Debug, Error, Clone)]
pub enum EngineError {
    /// Port open or read failure. Fatal to the session; forces disconnect.
    #[error("connection error: {0}")]
    Connection(String),
    /// A single command failed to transmit. Fatal only mid-profile.
    #[error("write failed: {0}")]
    Write(String),
    /// Malformed inbound line. Skipped, never fatal.
    #[error("malformed line: {0}")]
    Parse(String),
    /// Profile point rejected before insertion; existing profile untouched.
    #[error("invalid profile data: {0}")]
    Validation(&'static str),
    /// No usable records in a session log or profile file.
    #[error("no usable records")]
    EmptyLog,
    /// Operation not valid in the current engine state.
    #[error("invalid state: {0}")]
    State(String),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
