//! Background service taking periodic snapshots according to the stored policy.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use thiserror::Error;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use super::{
    backup_config::{self, BackupConfig},
    retention::{self, SweepReport},
    snapshot::{SnapshotError, Snapshotter},
};

/// `tokio::time::interval` rejects a zero period.
const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("snapshot failed: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("retention sweep failed: {0}")]
    Sweep(#[from] std::io::Error),
}

/// What one tick did.
#[derive(Debug)]
pub enum TickOutcome {
    Disabled,
    NotDue { next_due: DateTime<Utc> },
    SnapshotTaken { file_name: String, sweep: SweepReport },
}

pub struct BackupScheduler {
    pool: SqlitePool,
    snapshotter: Snapshotter,
    poll_interval: Duration,
}

impl BackupScheduler {
    pub fn new(pool: SqlitePool, snapshotter: Snapshotter, poll_interval: Duration) -> Self {
        Self {
            pool,
            snapshotter,
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
        }
    }

    /// Spawn the background backup loop
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.start().await;
        })
    }

    async fn start(&self) {
        info!(
            "Starting backup scheduler with interval {:?}",
            self.poll_interval
        );

        let mut interval = interval(self.poll_interval);

        loop {
            interval.tick().await;
            match self.tick(Utc::now()).await {
                Ok(TickOutcome::SnapshotTaken { file_name, sweep }) => info!(
                    file = %file_name,
                    swept = sweep.deleted.len(),
                    "Scheduled backup complete"
                ),
                Ok(outcome) => debug!(?outcome, "Backup scheduler tick"),
                Err(e) => error!("Scheduled backup failed: {}", e),
            }
        }
    }

    /// Take a snapshot if the policy says one is due, then sweep old ones.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickOutcome, SchedulerError> {
        let config = BackupConfig::resolve(&self.pool).await;
        if !config.enabled {
            return Ok(TickOutcome::Disabled);
        }

        if let Some(last) = backup_config::last_snapshot(&self.pool).await? {
            let period = chrono::Duration::from_std(config.frequency.period())
                .unwrap_or_else(|_| chrono::Duration::days(1));
            let next_due = last.created_at + period;
            if now < next_due {
                return Ok(TickOutcome::NotDue { next_due });
            }
        }

        let record = self.snapshotter.create_snapshot(&config).await?;
        let sweep = match retention::sweep(&config.local_path, config.retention_days, now).await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "Snapshot taken but retention sweep failed");
                return Err(e.into());
            }
        };

        Ok(TickOutcome::SnapshotTaken {
            file_name: record.file_name,
            sweep,
        })
    }
}
