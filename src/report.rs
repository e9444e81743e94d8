//! Pluggable reporters for probe records.

use crate::record::ProbeRecord;
use log::Level;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Log target used for probe lines.
pub const LOG_TARGET: &str = "threadprobe";

/// Trait for probe record sinks.
pub trait Reporter: Send + Sync {
    /// Called once per reported probe.
    fn report(&self, record: &ProbeRecord);

    /// Flush buffered output, if any.
    fn flush(&self) {}
}

/// Writes each record as one line through the `log` facade.
#[derive(Debug, Clone, Copy)]
pub struct LogReporter {
    level: Level,
}

impl LogReporter {
    pub fn new(level: Level) -> Self {
        Self { level }
    }
}

impl Default for LogReporter {
    fn default() -> Self {
        Self::new(Level::Info)
    }
}

impl Reporter for LogReporter {
    fn report(&self, record: &ProbeRecord) {
        log::log!(target: LOG_TARGET, self.level, "{}", record);
    }
}

/// Appends records to a file, one JSON object per line.
pub struct JsonLinesReporter {
    path: PathBuf,
    out: Mutex<BufWriter<File>>,
}

impl JsonLinesReporter {
    /// Open `path` for appending, creating parent directories.
    pub fn create(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            out: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_record(&self, record: &ProbeRecord) -> std::io::Result<()> {
        let line = serde_json::to_string(record).map_err(std::io::Error::other)?;
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        writeln!(out, "{}", line)
    }
}

impl Reporter for JsonLinesReporter {
    fn report(&self, record: &ProbeRecord) {
        if let Err(e) = self.write_record(record) {
            log::warn!(
                "failed to write probe record to {}: {}",
                self.path.display(),
                e
            );
        }
    }

    fn flush(&self) {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = out.flush() {
            log::warn!("failed to flush {}: {}", self.path.display(), e);
        }
    }
}

impl Drop for JsonLinesReporter {
    fn drop(&mut self) {
        Reporter::flush(self);
    }
}

/// Combines multiple reporters.
pub struct MultiReporter {
    reporters: Vec<Box<dyn Reporter>>,
}

impl MultiReporter {
    pub fn new(reporters: Vec<Box<dyn Reporter>>) -> Self {
        Self { reporters }
    }

    /// Add another reporter.
    pub fn push(&mut self, reporter: Box<dyn Reporter>) -> &mut Self {
        self.reporters.push(reporter);
        self
    }

    pub fn len(&self) -> usize {
        self.reporters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reporters.is_empty()
    }
}

impl Reporter for MultiReporter {
    fn report(&self, record: &ProbeRecord) {
        for r in &self.reporters {
            r.report(record);
        }
    }

    fn flush(&self) {
        for r in &self.reporters {
            r.flush();
        }
    }
}
