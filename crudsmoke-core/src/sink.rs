use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::error::{Error, Result};
use super::summary::RunSummary;

/// Destination for finished run summaries.
pub trait SummarySink: Send + Sync {
    /// Persists `summary`. Failures are reported by the sink, never returned.
    fn write(&self, summary: &RunSummary);
}

/// Appends each summary as one JSON line.
#[derive(Debug)]
pub struct JsonlSink {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens lazily and writes the line and flush under one lock.
    pub fn try_write(&self, summary: &RunSummary) -> Result<()> {
        let mut line = summary.to_json_line()?;
        line.push('\n');

        let mut guard = self.file.lock();
        if guard.is_none() {
            if let Some(parent) = self.path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            *guard = Some(file);
        }

        let result = match guard.as_mut() {
            Some(file) => file
                .write_all(line.as_bytes())
                .and_then(|()| file.flush()),
            None => Ok(()),
        };
        if result.is_err() {
            *guard = None;
        }
        result.map_err(Error::from)
    }
}

impl SummarySink for JsonlSink {
    fn write(&self, summary: &RunSummary) {
        if let Err(err) = self.try_write(summary) {
            tracing::warn!(path = %self.path.display(), error = %err, "failed to write run summary");
        }
    }
}
