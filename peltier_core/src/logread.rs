//! Offline session-log parser.
//!
//! Reconstructs a time series from logs written by `logfile` (and by older
//! recorders that logged only two temperatures). Lines that do not match
//! are skipped and counted; a log with zero usable records is an error.

use std::io::BufRead;
use std::path::Path;

use crate::error::EngineError;
use crate::profile::Profile;

const SECONDS_PER_DAY: u32 = 86_400;

/// One parsed log line, keyed by seconds since the first record.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub elapsed_s: f32,
    pub inside_temp: f32,
    pub outside_temp: f32,
    /// Absent in the legacy two-field format.
    pub set_temp: Option<f32>,
}

#[derive(Debug, Clone, Default)]
pub struct SessionLog {
    pub records: Vec<LogRecord>,
    /// Lines that matched neither format.
    pub skipped: usize,
}

impl SessionLog {
    pub fn read_from(r: impl BufRead) -> crate::error::Result<Self> {
        let mut log = Self::default();
        let mut first: Option<u32> = None;
        let mut prev_elapsed: u32 = 0;
        for line in r.lines() {
            let line = line?;
            let Some((stamp, inside, outside, set)) = parse_line(line.trim()) else {
                if !line.trim().is_empty() {
                    log.skipped += 1;
                }
                continue;
            };
            let base = *first.get_or_insert(stamp);
            // Wall-clock times wrap at midnight; a backwards step means the
            // session crossed into the next day.
            let mut elapsed = if stamp >= base {
                stamp - base
            } else {
                stamp + SECONDS_PER_DAY - base
            };
            while elapsed < prev_elapsed {
                elapsed += SECONDS_PER_DAY;
            }
            prev_elapsed = elapsed;
            log.records.push(LogRecord {
                elapsed_s: elapsed as f32,
                inside_temp: inside,
                outside_temp: outside,
                set_temp: set,
            });
        }
        if log.records.is_empty() {
            return Err(EngineError::EmptyLog.into());
        }
        Ok(log)
    }

    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::read_from(std::io::BufReader::new(file))
    }

    /// Total span of the session in seconds.
    pub fn duration_s(&self) -> f32 {
        self.records.last().map_or(0.0, |r| r.elapsed_s)
    }
}

/// Overlay a profile onto a session's time axis: waypoints shifted by the
/// offset at which the profile was started within the session.
pub fn profile_overlay(profile: &Profile, start_offset_s: f32) -> Vec<(f32, f32)> {
    profile
        .points()
        .iter()
        .map(|p| (p.time_offset_s + start_offset_s, p.target_temp))
        .collect()
}

/// Parse `[HH:MM:SS] inside, outside[, set]`; returns seconds-of-day and
/// the temperatures.
fn parse_line(line: &str) -> Option<(u32, f32, f32, Option<f32>)> {
    let rest = line.strip_prefix('[')?;
    let (stamp, rest) = rest.split_once(']')?;
    let mut hms = stamp.split(':');
    let h: u32 = hms.next()?.trim().parse().ok()?;
    let m: u32 = hms.next()?.trim().parse().ok()?;
    let s: u32 = hms.next()?.trim().parse().ok()?;
    if hms.next().is_some() || h > 23 || m > 59 || s > 59 {
        return None;
    }
    let mut fields = rest.trim().split(',').map(str::trim);
    let inside: f32 = fields.next()?.parse().ok()?;
    let outside: f32 = fields.next()?.parse().ok()?;
    let set = match fields.next() {
        Some(v) => Some(v.parse().ok()?),
        None => None,
    };
    if fields.next().is_some() {
        return None;
    }
    Some((h * 3_600 + m * 60 + s, inside, outside, set))
}
