//! `backup`: snapshots, retention, CSV exports and the scheduler daemon.

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use db::models::config::Config;
use serde::Serialize;
use services::services::{
    backup_config::{self, BackupConfig, KEY_PREFIX, SnapshotRecord},
    bundle_export::{BundleEntryStatus, export_all},
    entity::EntityKind,
    entity_export::EntityExporter,
    retention,
    scheduler::BackupScheduler,
    snapshot::{CommandSnapshotProvider, Snapshotter},
};
use tokio::task::JoinHandle;
use tracing::info;
use utils::{response::OperationResult, timestamp::file_stamp};

use crate::{DEFAULT_DATABASE_URL, open_store, output::CommandOutput, parse_entity};

/// Database snapshots and CSV exports for the flower wholesale store
#[derive(Parser, Debug)]
#[command(name = "backup")]
#[command(author, version, about, long_about = None)]
pub struct BackupCli {
    #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL, global = true)]
    pub database_url: String,

    /// Maximum run time of one dump or restore command, in seconds
    #[arg(long, env = "BACKUP_COMMAND_TIMEOUT", default_value_t = 1800, global = true)]
    pub command_timeout: u64,

    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: BackupCommand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportTarget {
    All,
    Entity(EntityKind),
}

fn parse_export_target(value: &str) -> Result<ExportTarget, String> {
    if value.eq_ignore_ascii_case("all") {
        Ok(ExportTarget::All)
    } else {
        parse_entity(value).map(ExportTarget::Entity)
    }
}

fn parse_setting(value: &str) -> Result<(String, String), String> {
    let (key, setting) = value
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{value}'"))?;
    if !key.starts_with(KEY_PREFIX) {
        return Err(format!("setting keys must start with '{KEY_PREFIX}'"));
    }
    Ok((key.to_string(), setting.to_string()))
}

#[derive(Subcommand, Debug)]
pub enum BackupCommand {
    /// Write a full database snapshot into the configured backup directory
    Snapshot,
    /// Delete snapshots older than the retention window
    Sweep {
        /// Override the configured retention window
        #[arg(long)]
        retention_days: Option<i64>,
    },
    /// Export one entity, or `all` as a zipped bundle, to CSV
    Export {
        #[arg(value_parser = parse_export_target)]
        target: ExportTarget,
        /// Output directory, defaults to the configured export path
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Replay a snapshot file into the database
    RestoreSnapshot { file: PathBuf },
    /// Show the backup settings, optionally changing some first
    Config {
        /// `backup.<name>=<value>`, may be repeated
        #[arg(long = "set", value_parser = parse_setting)]
        set: Vec<(String, String)>,
    },
    /// Run the snapshot scheduler until interrupted
    Daemon {
        #[arg(long, default_value_t = 300, value_parser = clap::value_parser!(u64).range(1..))]
        poll_seconds: u64,
    },
}

#[derive(Debug, Serialize)]
struct ConfigView {
    config: BackupConfig,
    last_snapshot: Option<SnapshotRecord>,
}

pub async fn run(cli: BackupCli) -> bool {
    let output = match execute(&cli).await {
        Ok(output) => output,
        Err(e) => CommandOutput::error(&e),
    };
    output.print(cli.json);
    output.success
}

fn snapshotter(cli: &BackupCli, db: &db::DBService) -> anyhow::Result<Snapshotter> {
    let provider = CommandSnapshotProvider::for_database_url(&cli.database_url)?
        .with_timeout(Duration::from_secs(cli.command_timeout));
    Ok(Snapshotter::new(db.pool.clone(), Arc::new(provider)))
}

/// Wait for `shutdown`, failing early if the scheduler task ends on its own.
async fn supervise(
    mut handle: JoinHandle<()>,
    shutdown: impl Future<Output = std::io::Result<()>>,
) -> anyhow::Result<()> {
    tokio::select! {
        result = &mut handle => match result {
            Ok(()) => anyhow::bail!("backup scheduler stopped unexpectedly"),
            Err(e) => anyhow::bail!("backup scheduler crashed: {e}"),
        },
        signal = shutdown => {
            handle.abort();
            signal.context("cannot listen for shutdown signal")
        }
    }
}

pub async fn execute(cli: &BackupCli) -> anyhow::Result<CommandOutput> {
    let db = open_store(&cli.database_url).await?;

    match &cli.command {
        BackupCommand::Snapshot => {
            let config = BackupConfig::resolve(&db.pool).await;
            let record = snapshotter(cli, &db)?.create_snapshot(&config).await?;
            let text = format!(
                "Snapshot written to {} ({} bytes){}",
                record.path.display(),
                record.size_bytes,
                record
                    .mirrored_to
                    .as_ref()
                    .map(|p| format!(", mirrored to {}", p.display()))
                    .unwrap_or_default()
            );
            Ok(CommandOutput::new(&OperationResult::success(record), text))
        }
        BackupCommand::Sweep { retention_days } => {
            let config = BackupConfig::resolve(&db.pool).await;
            let days = retention_days.unwrap_or(config.retention_days);
            let report = retention::sweep(&config.local_path, days, Utc::now())
                .await
                .with_context(|| format!("cannot sweep {}", config.local_path.display()))?;
            let text = format!(
                "Deleted {} snapshot(s), kept {}, {} failed",
                report.deleted.len(),
                report.kept.len(),
                report.failed.len()
            );
            let result = if report.failed.is_empty() {
                OperationResult::success_with_message(report, text.clone())
            } else {
                OperationResult::failure_with_data(report, text.clone())
            };
            Ok(CommandOutput::new(&result, text))
        }
        BackupCommand::Export { target, output } => {
            let config = BackupConfig::resolve(&db.pool).await;
            let dir = output.clone().unwrap_or(config.export_path);
            let exporter = EntityExporter::new(db.pool.clone());
            match target {
                ExportTarget::Entity(kind) => {
                    let report = exporter
                        .export_entity(*kind, &dir, &file_stamp(Utc::now()))
                        .await?;
                    let text = format!("Exported {} {} row(s) to {}", report.rows, kind, report.file.display());
                    Ok(CommandOutput::new(&OperationResult::success(report), text))
                }
                ExportTarget::All => {
                    let report = export_all(&exporter, &dir).await?;
                    let mut text = String::new();
                    for entry in &report.entities {
                        match &entry.status {
                            BundleEntryStatus::Exported { rows, .. } => {
                                text.push_str(&format!("{}: {rows} rows\n", entry.entity))
                            }
                            BundleEntryStatus::Failed { error } => {
                                text.push_str(&format!("{}: FAILED: {error}\n", entry.entity))
                            }
                        }
                    }
                    text.push_str(&format!("Archive: {}", report.archive.display()));
                    let result = if report.all_exported() {
                        OperationResult::success(report)
                    } else {
                        OperationResult::failure_with_data(report, "some entities failed to export")
                    };
                    Ok(CommandOutput::new(&result, text))
                }
            }
        }
        BackupCommand::RestoreSnapshot { file } => {
            snapshotter(cli, &db)?.restore_snapshot(file).await?;
            let text = format!("Restored {}", file.display());
            Ok(CommandOutput::new(&OperationResult::success(file.clone()), text))
        }
        BackupCommand::Config { set } => {
            for (key, value) in set {
                Config::upsert(&db.pool, key, value).await?;
                info!(key = %key, "Updated backup setting");
            }
            let view = ConfigView {
                config: BackupConfig::resolve(&db.pool).await,
                last_snapshot: backup_config::last_snapshot(&db.pool).await?,
            };
            let text = serde_json::to_string_pretty(&view)?;
            Ok(CommandOutput::new(&OperationResult::success(view), text))
        }
        BackupCommand::Daemon { poll_seconds } => {
            let scheduler = BackupScheduler::new(
                db.pool.clone(),
                snapshotter(cli, &db)?,
                Duration::from_secs(*poll_seconds),
            );
            supervise(scheduler.spawn(), tokio::signal::ctrl_c()).await?;
            Ok(CommandOutput::new(
                &OperationResult::<()>::success_with_message((), "scheduler stopped"),
                "Backup scheduler stopped",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn cli(args: &[&str]) -> BackupCli {
        BackupCli::try_parse_from(std::iter::once("backup").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_parse_export_targets() {
        match cli(&["export", "ALL"]).command {
            BackupCommand::Export { target, output } => {
                assert_eq!(target, ExportTarget::All);
                assert_eq!(output, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
        match cli(&["export", "invoices", "--output", "/tmp/out"]).command {
            BackupCommand::Export { target, output } => {
                assert_eq!(target, ExportTarget::Entity(EntityKind::Invoices));
                assert_eq!(output, Some(PathBuf::from("/tmp/out")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_config_set_requires_backup_prefix() {
        match cli(&["config", "--set", "backup.retention_days=14"]).command {
            BackupCommand::Config { set } => {
                assert_eq!(set, vec![("backup.retention_days".to_string(), "14".to_string())])
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(BackupCli::try_parse_from(["backup", "config", "--set", "shop.name=x"]).is_err());
    }

    #[test]
    fn test_daemon_rejects_zero_poll_interval() {
        assert!(BackupCli::try_parse_from(["backup", "daemon", "--poll-seconds", "0"]).is_err());
        match cli(&["daemon", "--poll-seconds", "1"]).command {
            BackupCommand::Daemon { poll_seconds } => assert_eq!(poll_seconds, 1),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_supervise_reports_a_crashed_scheduler() {
        let crashed = tokio::spawn(async { panic!("scheduler loop died") });
        let err = supervise(crashed, std::future::pending()).await.unwrap_err();
        assert!(err.to_string().contains("crashed"), "{err}");

        let running = tokio::spawn(std::future::pending::<()>());
        supervise(running, async { Ok(()) }).await.unwrap();
    }

    #[tokio::test]
    async fn test_config_set_then_sweep_uses_stored_path() {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}", dir.path().join("flowers.db").display());
        let snapshots = dir.path().join("snapshots");
        std::fs::create_dir(&snapshots).unwrap();
        std::fs::write(snapshots.join("backup-2020-01-01T00-00-00-000Z.sql"), b"old").unwrap();

        let local_path = format!("backup.local_path={}", snapshots.display());
        let output = execute(&cli(&["--database-url", &url, "config", "--set", &local_path]))
            .await
            .unwrap();
        assert!(output.success);
        assert_eq!(
            output.json["data"]["config"]["local_path"],
            snapshots.display().to_string()
        );

        let output = execute(&cli(&["--database-url", &url, "sweep"])).await.unwrap();
        assert!(output.success, "{}", output.text);
        assert!(!snapshots.join("backup-2020-01-01T00-00-00-000Z.sql").exists());
    }

    #[tokio::test]
    async fn test_export_single_entity() {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}", dir.path().join("flowers.db").display());
        let out = dir.path().join("exports");
        let out_arg = out.to_string_lossy().into_owned();

        let output = execute(&cli(&["--database-url", &url, "export", "products", "--output", &out_arg]))
            .await
            .unwrap();

        assert!(output.success, "{}", output.text);
        let files: Vec<_> = std::fs::read_dir(&out).unwrap().collect();
        assert_eq!(files.len(), 1);
    }
}
