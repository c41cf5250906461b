//! Temperature profile model and interpolation.
//!
//! A `Profile` is an ordered sequence of waypoints with strictly unique time
//! offsets, kept sorted ascending after every insertion and deletion.
//! `interp` samples it as a piecewise-linear trajectory, clamped at both
//! ends and rounded to 0.1 °C.

use std::io::{BufRead, Write};
use std::path::Path;

use crate::error::EngineError;

/// Lowest commandable temperature (°C).
pub const MIN_TEMP_C: f32 = 5.0;
/// Highest commandable temperature (°C).
pub const MAX_TEMP_C: f32 = 70.0;

/// Round to one decimal place, the wire resolution of the device.
#[inline]
pub fn round_tenth(v: f32) -> f32 {
    (v * 10.0).round() / 10.0
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfilePoint {
    /// Seconds from profile start; >= 0, unique within a profile.
    pub time_offset_s: f32,
    /// Target temperature in [MIN_TEMP_C, MAX_TEMP_C].
    pub target_temp: f32,
}

/// Sorted, validated sequence of profile points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Profile {
    points: Vec<ProfilePoint>,
}

impl Profile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a profile from unordered `(time, temp)` pairs, validating each.
    pub fn from_points(pairs: impl IntoIterator<Item = (f32, f32)>) -> Result<Self, EngineError> {
        let mut profile = Self::new();
        for (t, temp) in pairs {
            profile.insert(t, temp)?;
        }
        Ok(profile)
    }

    /// Insert a waypoint, keeping the sequence sorted. Rejects out-of-range
    /// values and duplicate time offsets without touching existing points.
    pub fn insert(&mut self, time_offset_s: f32, target_temp: f32) -> Result<(), EngineError> {
        if !time_offset_s.is_finite() || time_offset_s < 0.0 {
            return Err(EngineError::Validation("time offset must be >= 0"));
        }
        if !target_temp.is_finite() || !(MIN_TEMP_C..=MAX_TEMP_C).contains(&target_temp) {
            return Err(EngineError::Validation(
                "temperature must be between 5 and 70 °C",
            ));
        }
        match self
            .points
            .binary_search_by(|p| p.time_offset_s.total_cmp(&time_offset_s))
        {
            Ok(_) => Err(EngineError::Validation("duplicate time offset")),
            Err(idx) => {
                self.points.insert(
                    idx,
                    ProfilePoint {
                        time_offset_s,
                        target_temp,
                    },
                );
                Ok(())
            }
        }
    }

    /// Remove the waypoint at `index`; out-of-range indices are ignored.
    pub fn remove(&mut self, index: usize) {
        if index < self.points.len() {
            self.points.remove(index);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn points(&self) -> &[ProfilePoint] {
        &self.points
    }

    /// Time of the last waypoint; 0 for an empty profile.
    pub fn total_duration(&self) -> f32 {
        self.points.last().map_or(0.0, |p| p.time_offset_s)
    }

    /// First waypoint's temperature, if any.
    pub fn first_temp(&self) -> Option<f32> {
        self.points.first().map(|p| p.target_temp)
    }

    /// Piecewise-linear sample at time `t`, clamped to the first/last
    /// temperature outside the profile's time range and rounded to 0.1 °C.
    /// None for an empty profile.
    pub fn interp(&self, t: f32) -> Option<f32> {
        let first = self.points.first()?;
        let last = self.points.last()?;
        if t <= first.time_offset_s {
            return Some(first.target_temp);
        }
        if t >= last.time_offset_s {
            return Some(last.target_temp);
        }
        // Unique bracketing pair exists: times are strictly increasing and
        // t is strictly inside the range.
        for pair in self.points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if a.time_offset_s <= t && t <= b.time_offset_s {
                let fraction = (t - a.time_offset_s) / (b.time_offset_s - a.time_offset_s);
                let v = a.target_temp + (b.target_temp - a.target_temp) * fraction;
                return Some(round_tenth(v));
            }
        }
        Some(last.target_temp)
    }

    /// Serialize as one `time,temperature` pair per line.
    pub fn write_to(&self, mut w: impl Write) -> std::io::Result<()> {
        for p in &self.points {
            writeln!(w, "{},{}", p.time_offset_s, p.target_temp)?;
        }
        Ok(())
    }

    /// Parse the `time,temperature` line format; blank lines are skipped,
    /// anything else is a validation error. An entirely empty file is
    /// `EmptyLog`, not an empty profile.
    pub fn read_from(r: impl BufRead) -> crate::error::Result<Self> {
        let mut profile = Self::new();
        for line in r.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (t_str, temp_str) = line
                .split_once(',')
                .ok_or(EngineError::Validation("expected time,temperature"))?;
            let t: f32 = t_str
                .trim()
                .parse()
                .map_err(|_| EngineError::Validation("invalid time value"))?;
            let temp: f32 = temp_str
                .trim()
                .parse()
                .map_err(|_| EngineError::Validation("invalid temperature value"))?;
            profile.insert(t, temp)?;
        }
        if profile.is_empty() {
            return Err(EngineError::EmptyLog.into());
        }
        Ok(profile)
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let file = std::fs::File::create(path)?;
        self.write_to(std::io::BufWriter::new(file))
    }

    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::read_from(std::io::BufReader::new(file))
    }
}
