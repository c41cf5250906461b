//! Session recording: append-only text log of telemetry records.
//!
//! One line per record, `[HH:MM:SS] inside, outside, set`, flushed as it is
//! written so a crash loses at most the current line. The same format is
//! read back by `logread`.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::reader::TelemetryRecord;

pub struct SessionRecorder {
    path: PathBuf,
    out: BufWriter<File>,
}

impl SessionRecorder {
    /// Open (appending) or create the log file at `path`.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            out: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_record(&mut self, rec: &TelemetryRecord) -> std::io::Result<()> {
        let stamp = rec.received_at.format("%H:%M:%S");
        match rec.set_temp {
            Some(set) => writeln!(
                self.out,
                "[{stamp}] {:.1}, {:.1}, {:.1}",
                rec.inside_temp, rec.outside_temp, set
            )?,
            None => writeln!(
                self.out,
                "[{stamp}] {:.1}, {:.1}",
                rec.inside_temp, rec.outside_temp
            )?,
        }
        self.out.flush()
    }
}
