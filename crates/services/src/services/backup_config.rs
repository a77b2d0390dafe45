//! Backup policy resolved from the `backup.*` rows of the config table.

use std::{path::PathBuf, str::FromStr, time::Duration};

use chrono::{DateTime, Utc};
use db::models::config::Config;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use strum_macros::{Display, EnumString};
use tracing::{error, warn};

pub const KEY_PREFIX: &str = "backup.";
pub const KEY_ENABLED: &str = "backup.enabled";
pub const KEY_FREQUENCY: &str = "backup.frequency";
pub const KEY_RETENTION_DAYS: &str = "backup.retention_days";
pub const KEY_LOCAL_PATH: &str = "backup.local_path";
pub const KEY_EXTERNAL_PATH: &str = "backup.external_path";
pub const KEY_EXPORT_PATH: &str = "backup.export_path";
pub const KEY_LAST_SNAPSHOT: &str = "backup.last_snapshot";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum BackupFrequency {
    Hourly,
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl BackupFrequency {
    /// Nominal spacing between two scheduled snapshots.
    pub fn period(&self) -> Duration {
        let hours = match self {
            BackupFrequency::Hourly => 1,
            BackupFrequency::Daily => 24,
            BackupFrequency::Weekly => 24 * 7,
            BackupFrequency::Monthly => 24 * 30,
        };
        Duration::from_secs(hours * 3600)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupConfig {
    pub enabled: bool,
    pub frequency: BackupFrequency,
    pub retention_days: i64,
    pub local_path: PathBuf,
    pub external_path: Option<PathBuf>,
    pub export_path: PathBuf,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            frequency: BackupFrequency::Daily,
            retention_days: 30,
            local_path: PathBuf::from("./backups"),
            external_path: None,
            export_path: PathBuf::from("./exports"),
        }
    }
}

/// What the last successful snapshot produced, stored under `backup.last_snapshot`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub file_name: String,
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
    pub mirrored_to: Option<PathBuf>,
}

impl BackupConfig {
    /// Read the persisted policy. Never fails: a read error yields the defaults.
    pub async fn resolve(pool: &SqlitePool) -> Self {
        match Config::find_by_prefix(pool, KEY_PREFIX).await {
            Ok(rows) => Self::from_entries(rows.iter().map(|c| (c.key.as_str(), c.value.as_str()))),
            Err(e) => {
                error!(error = %e, "Failed to read backup settings, using defaults");
                Self::default()
            }
        }
    }

    /// Build a config from raw key/value pairs. Unknown keys are ignored and
    /// values that do not coerce keep the default.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut config = Self::default();
        for (key, value) in entries {
            let value = value.trim();
            match key {
                KEY_ENABLED => {
                    if let Some(enabled) = coerce_bool(key, value) {
                        config.enabled = enabled;
                    }
                }
                KEY_FREQUENCY => {
                    if let Some(frequency) = coerce::<BackupFrequency>(key, value) {
                        config.frequency = frequency;
                    }
                }
                KEY_RETENTION_DAYS => {
                    if let Some(days) = coerce::<i64>(key, value) {
                        config.retention_days = days;
                    }
                }
                KEY_LOCAL_PATH if !value.is_empty() => config.local_path = PathBuf::from(value),
                KEY_EXTERNAL_PATH => {
                    config.external_path = (!value.is_empty()).then(|| PathBuf::from(value));
                }
                KEY_EXPORT_PATH if !value.is_empty() => config.export_path = PathBuf::from(value),
                _ => {}
            }
        }
        config
    }

    /// Persist this policy back into the config table.
    pub async fn save(&self, pool: &SqlitePool) -> Result<(), sqlx::Error> {
        Config::upsert(pool, KEY_ENABLED, &self.enabled.to_string()).await?;
        Config::upsert(pool, KEY_FREQUENCY, &self.frequency.to_string()).await?;
        Config::upsert(pool, KEY_RETENTION_DAYS, &self.retention_days.to_string()).await?;
        Config::upsert(pool, KEY_LOCAL_PATH, &self.local_path.to_string_lossy()).await?;
        let external = self
            .external_path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        Config::upsert(pool, KEY_EXTERNAL_PATH, &external).await?;
        Config::upsert(pool, KEY_EXPORT_PATH, &self.export_path.to_string_lossy()).await?;
        Ok(())
    }
}

pub async fn record_snapshot(pool: &SqlitePool, record: &SnapshotRecord) -> Result<(), sqlx::Error> {
    let value = serde_json::to_string(record)
        .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
    Config::upsert(pool, KEY_LAST_SNAPSHOT, &value).await?;
    Ok(())
}

pub async fn last_snapshot(pool: &SqlitePool) -> Result<Option<SnapshotRecord>, sqlx::Error> {
    let Some(row) = Config::find_by_key(pool, KEY_LAST_SNAPSHOT).await? else {
        return Ok(None);
    };
    match serde_json::from_str(&row.value) {
        Ok(record) => Ok(Some(record)),
        Err(e) => {
            warn!(error = %e, "Ignoring unreadable {}", KEY_LAST_SNAPSHOT);
            Ok(None)
        }
    }
}

fn coerce<T: FromStr>(key: &str, value: &str) -> Option<T> {
    match value.parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(key, value, "Unparseable backup setting, keeping default");
            None
        }
    }
}

fn coerce_bool(key: &str, value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => {
            warn!(key, value, "Unparseable backup setting, keeping default");
            None
        }
    }
}
