//! Deletes snapshot files older than the retention window.

use std::{path::Path, sync::LazyLock};

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};
use utils::timestamp::{FILE_STAMP_PATTERN, parse_file_stamp};

static SNAPSHOT_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^backup-({FILE_STAMP_PATTERN})\.[A-Za-z0-9]+$"))
        .expect("snapshot name regex is valid")
});

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SweepReport {
    pub deleted: Vec<String>,
    pub kept: Vec<String>,
    /// Entries whose names do not look like snapshots.
    pub skipped: Vec<String>,
    pub failed: Vec<SweepFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepFailure {
    pub file_name: String,
    pub error: String,
}

/// Timestamp embedded in a snapshot file name, if it is one.
pub fn snapshot_stamp(file_name: &str) -> Option<DateTime<Utc>> {
    let caps = SNAPSHOT_NAME_RE.captures(file_name)?;
    parse_file_stamp(caps.get(1)?.as_str())
}

/// `now - retention_days`. A window too wide to represent keeps everything.
fn retention_cutoff(now: DateTime<Utc>, retention_days: i64) -> DateTime<Utc> {
    Duration::try_days(retention_days)
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Remove every snapshot in `dir` stamped strictly before `now - retention_days`.
pub async fn sweep(
    dir: &Path,
    retention_days: i64,
    now: DateTime<Utc>,
) -> Result<SweepReport, std::io::Error> {
    let mut report = SweepReport::default();

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(dir = %dir.display(), "Backup directory does not exist, nothing to sweep");
            return Ok(report);
        }
        Err(e) => return Err(e),
    };

    let cutoff = retention_cutoff(now, retention_days);
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();

    for name in names {
        let Some(stamp) = snapshot_stamp(&name) else {
            report.skipped.push(name);
            continue;
        };
        if stamp >= cutoff {
            report.kept.push(name);
            continue;
        }
        match tokio::fs::remove_file(dir.join(&name)).await {
            Ok(()) => {
                debug!(file = %name, "Deleted expired snapshot");
                report.deleted.push(name);
            }
            Err(e) => {
                warn!(file = %name, error = %e, "Failed to delete expired snapshot");
                report.failed.push(SweepFailure {
                    file_name: name,
                    error: e.to_string(),
                });
            }
        }
    }

    info!(
        dir = %dir.display(),
        retention_days,
        deleted = report.deleted.len(),
        kept = report.kept.len(),
        "Retention sweep complete"
    );
    Ok(report)
}
