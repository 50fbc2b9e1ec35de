//! VaultGuard Core - Retention Sweep
//!
//! Age-based deletion of encrypted files, driven only by filesystem
//! modification times. Nothing is decrypted here, so the sweep can run
//! unconditionally at process start without any authentication.

use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;

use chrono::{SecondsFormat, TimeZone, Utc};

use crate::storage::{BLOB_SUFFIX, META_SUFFIX};
use crate::textlog::TextLog;

/// Retention history log (plain text, next to the vault)
pub const RETENTION_LOG_FILE: &str = "retention_log.txt";
/// Consent history log trimmed alongside the vault files
pub const CONSENT_LOG_FILE: &str = "consent_log.txt";

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Delete every `.vgenc`/`.vgmeta` file in `storage_dir` whose mtime is
/// older than `now - days`. `days == 0` means keep forever. Returns the
/// number of files deleted. Logs into `{logs_dir}/retention_log.txt` and
/// trims the consent log to the same window.
pub fn apply_retention(storage_dir: &Path, logs_dir: &Path, days: u32, now_ms: i64) -> usize {
    if days == 0 {
        return 0;
    }
    let cutoff_ms = now_ms - i64::from(days) * DAY_MS;
    let log = TextLog::new(logs_dir.join(RETENTION_LOG_FILE));

    let mut deleted = 0;
    if storage_dir.is_dir() {
        let entries = match fs::read_dir(storage_dir) {
            Ok(entries) => entries,
            Err(_) => return 0,
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(n) if n.ends_with(BLOB_SUFFIX) || n.ends_with(META_SUFFIX) => n.to_string(),
                _ => continue,
            };
            if file_mtime_ms(&path).is_some_and(|mtime| mtime < cutoff_ms)
                && fs::remove_file(&path).is_ok()
            {
                deleted += 1;
                log.append("DELETED_FILE", &format!("name={name}"));
            }
        }
    }

    let trimmed = trim_consent_log(logs_dir, cutoff_ms);
    if trimmed > 0 {
        log.append("TRIMMED_CONSENT_LOG", &format!("trimmedLines={trimmed}"));
    }
    if deleted > 0 {
        log.append("RETENTION_RUN", &format!("deleted={deleted} days={days}"));
    }
    deleted
}

/// Drop consent-log lines older than the cutoff. Lines start with an
/// ISO-8601 UTC timestamp, which sorts lexicographically, so a string
/// comparison against the formatted cutoff is enough. Returns the number
/// of lines dropped; any I/O problem leaves the file untouched.
pub fn trim_consent_log(logs_dir: &Path, cutoff_ms: i64) -> usize {
    let path = logs_dir.join(CONSENT_LOG_FILE);
    if !path.is_file() {
        return 0;
    }
    let iso_cutoff = match Utc.timestamp_millis_opt(cutoff_ms).single() {
        Some(ts) => ts.to_rfc3339_opts(SecondsFormat::Millis, true),
        None => return 0,
    };

    let content = match fs::read_to_string(&path) {
        Ok(c) => c,
        Err(_) => return 0,
    };

    let mut kept = Vec::new();
    let mut trimmed = 0;
    for line in content.lines() {
        let ts = line.split('|').next().unwrap_or("");
        if !ts.is_empty() && *ts >= *iso_cutoff {
            kept.push(line);
        } else {
            trimmed += 1;
        }
    }
    if trimmed == 0 {
        return 0;
    }

    let mut rewritten = kept.join("\n");
    if !rewritten.is_empty() {
        rewritten.push('\n');
    }
    if fs::write(&path, rewritten).is_err() {
        return 0;
    }
    trimmed
}

fn file_mtime_ms(path: &Path) -> Option<i64> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    let since_epoch = modified.duration_since(UNIX_EPOCH).ok()?;
    i64::try_from(since_epoch.as_millis()).ok()
}
