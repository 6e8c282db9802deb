//! Append-only metrics journal
//!
//! One JSON object per line:
//!
//! ```text
//! {"coherence":0.93,"sigma_mean":0.41,"status":"ok","step":1,"t":1760000000.125}
//! {"coherence":0.92,"sigma_mean":0.42,"status":"ok","step":2,"t":1760000000.177}
//! ```
//!
//! `step` and `t` (wall-clock epoch seconds) are written by the journal
//! and take precedence over metrics of the same name. The sink is opened
//! on each append and closed straight after; single writer only.

use chrono::Utc;
use ciel_core::{Error, Metrics, Result};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    /// Nothing is touched on disk until the first `log`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record stamped with the current wall time.
    pub fn log(&self, step: u64, metrics: &Metrics) -> Result<()> {
        self.log_at(step, wall_clock_secs(), metrics)
    }

    /// Append one record with an explicit timestamp.
    pub fn log_at(&self, step: u64, t: f64, metrics: &Metrics) -> Result<()> {
        let line = render_line(step, t, metrics)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::sink_unavailable(&self.path, e))?;
        }
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                tracing::warn!(path = %self.path.display(), error = %e, "journal sink unavailable");
                Error::sink_unavailable(&self.path, e)
            })?;
        // one write per line keeps lines whole under a single writer
        f.write_all(line.as_bytes())
            .map_err(|e| Error::sink_unavailable(&self.path, e))
    }

    /// Parse every line of a journal file.
    pub fn read_records(path: &Path) -> Result<Vec<Value>> {
        let content = fs::read_to_string(path)?;
        content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).map_err(Error::from))
            .collect()
    }
}

/// Serialize `{step, t, ...metrics}` followed by a newline.
pub fn render_line(step: u64, t: f64, metrics: &Metrics) -> Result<String> {
    let mut record = match serde_json::to_value(metrics)? {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    record.insert("step".into(), Value::from(step));
    record.insert("t".into(), Value::from(t));
    let mut line = serde_json::to_string(&Value::Object(record))?;
    line.push('\n');
    Ok(line)
}

/// Seconds since the Unix epoch.
pub fn wall_clock_secs() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1e6
}
