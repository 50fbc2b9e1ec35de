//! VaultGuard Core - Plain Transparency Logs
//!
//! Newline-delimited `timestamp|event|detail` records kept outside the
//! encrypted vault. These exist for user-facing transparency (access and
//! retention history), are explicitly not confidential, and are written
//! best-effort: a logging failure never fails the operation being logged.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use chrono::{SecondsFormat, TimeZone, Utc};

/// Append-only plain text event log
pub struct TextLog {
    path: PathBuf,
}

impl TextLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Append `timestamp|event|detail` with the current time.
    pub fn append(&self, event: &str, detail: &str) {
        self.append_at(Utc::now().timestamp_millis(), event, detail);
    }

    pub fn append_at(&self, ts_ms: i64, event: &str, detail: &str) {
        let ts = Utc
            .timestamp_millis_opt(ts_ms)
            .single()
            .unwrap_or_else(Utc::now)
            .to_rfc3339_opts(SecondsFormat::Millis, true);
        let line = format!("{ts}|{event}|{detail}\n");

        let result = (|| -> std::io::Result<()> {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?
                .write_all(line.as_bytes())
        })();
        if let Err(e) = result {
            log::warn!("transparency log {} append failed: {e}", self.path.display());
        }
    }

    /// All lines, oldest first. Missing file reads as empty.
    pub fn read_lines(&self) -> Vec<String> {
        fs::read_to_string(&self.path)
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }
}
