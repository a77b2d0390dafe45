//! Full-database snapshots produced by an external dump tool.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};
use utils::timestamp::file_stamp;

use super::backup_config::{self, BackupConfig, SnapshotRecord};

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Argument placeholder for the snapshot path. A command that names the file
/// itself is run without stdin/stdout redirection.
pub const FILE_PLACEHOLDER: &str = "{file}";

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("{program} timed out after {after:?}")]
    Timeout { program: String, after: Duration },
    #[error("unsupported database url: {0}")]
    UnsupportedUrl(String),
    #[error("snapshot file not found: {0}")]
    MissingFile(PathBuf),
}

/// Something that can write a full dump of the store to a file and replay one.
///
/// `dump` must either leave a complete file at `target` and return `Ok`, or
/// return an error. Implementations bound their own run time and report an
/// overrun as [`SnapshotError::Timeout`].
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    /// File extension for produced snapshots, without the dot.
    fn extension(&self) -> &str;

    async fn dump(&self, target: &Path) -> Result<(), SnapshotError>;

    async fn restore(&self, source: &Path) -> Result<(), SnapshotError>;
}

/// Program plus arguments for one side of a provider.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            envs: Vec::new(),
        }
    }

    fn names_file(&self) -> bool {
        self.args.iter().any(|arg| arg.contains(FILE_PLACEHOLDER))
    }

    fn command(&self, file: &Path) -> Command {
        let file = file.to_string_lossy();
        let mut cmd = Command::new(&self.program);
        cmd.args(self.args.iter().map(|arg| arg.replace(FILE_PLACEHOLDER, &file)));
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }
        cmd.kill_on_drop(true);
        cmd
    }
}

/// Provider that shells out. Unless its arguments carry [`FILE_PLACEHOLDER`],
/// the dump command writes the snapshot to stdout and the restore command
/// reads it from stdin.
#[derive(Debug, Clone)]
pub struct CommandSnapshotProvider {
    dump: ToolCommand,
    restore: ToolCommand,
    extension: String,
    timeout: Duration,
}

impl CommandSnapshotProvider {
    pub fn new(dump: ToolCommand, restore: ToolCommand, extension: impl Into<String>) -> Self {
        Self {
            dump,
            restore,
            extension: extension.into(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `pg_dump`/`psql` for Postgres urls, `sqlite3` for SQLite urls. Both
    /// restores replace the current contents of a live store.
    pub fn for_database_url(url: &str) -> Result<Self, SnapshotError> {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            let dump = ToolCommand::new(
                "pg_dump",
                ["--clean", "--if-exists", "--no-owner", "--no-acl", "--dbname", url],
            );
            let restore = ToolCommand::new(
                "psql",
                ["-X", "-q", "-v", "ON_ERROR_STOP=1", "--dbname", url],
            );
            return Ok(Self::new(dump, restore, "sql"));
        }

        if let Some(rest) = url.strip_prefix("sqlite:") {
            let path = rest.trim_start_matches("//");
            let path = path.split('?').next().unwrap_or_default();
            if path.is_empty() || path == ":memory:" {
                return Err(SnapshotError::UnsupportedUrl(url.to_string()));
            }
            let dump = ToolCommand::new("sqlite3", [path, ".backup '{file}'"]);
            let restore = ToolCommand::new("sqlite3", [path, ".restore '{file}'"]);
            return Ok(Self::new(dump, restore, "sqlite"));
        }

        Err(SnapshotError::UnsupportedUrl(url.to_string()))
    }

    async fn run(&self, tool: &ToolCommand, mut cmd: Command) -> Result<(), SnapshotError> {
        cmd.stderr(Stdio::piped());
        debug!(program = %tool.program, args = ?tool.args, "Running snapshot command");

        let child = cmd.spawn().map_err(|source| SnapshotError::Spawn {
            program: tool.program.clone(),
            source,
        })?;

        // Dropping the future on timeout kills the child.
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| SnapshotError::Timeout {
                program: tool.program.clone(),
                after: self.timeout,
            })??;

        if !output.status.success() {
            return Err(SnapshotError::CommandFailed {
                program: tool.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SnapshotProvider for CommandSnapshotProvider {
    fn extension(&self) -> &str {
        &self.extension
    }

    async fn dump(&self, target: &Path) -> Result<(), SnapshotError> {
        let mut cmd = self.dump.command(target);
        cmd.stdin(Stdio::null());
        if self.dump.names_file() {
            cmd.stdout(Stdio::null());
        } else {
            let output_file = tokio::fs::File::create(target).await?.into_std().await;
            cmd.stdout(Stdio::from(output_file));
        }
        self.run(&self.dump, cmd).await
    }

    async fn restore(&self, source: &Path) -> Result<(), SnapshotError> {
        let mut cmd = self.restore.command(source);
        cmd.stdout(Stdio::null());
        if self.restore.names_file() {
            cmd.stdin(Stdio::null());
        } else {
            let input_file = tokio::fs::File::open(source).await?.into_std().await;
            cmd.stdin(Stdio::from(input_file));
        }
        self.run(&self.restore, cmd).await
    }
}

/// Writes timestamped snapshots into the configured directory.
#[derive(Clone)]
pub struct Snapshotter {
    pool: SqlitePool,
    provider: Arc<dyn SnapshotProvider>,
}

impl Snapshotter {
    pub fn new(pool: SqlitePool, provider: Arc<dyn SnapshotProvider>) -> Self {
        Self { pool, provider }
    }

    pub async fn create_snapshot(&self, config: &BackupConfig) -> Result<SnapshotRecord, SnapshotError> {
        tokio::fs::create_dir_all(&config.local_path).await?;

        let created_at = Utc::now();
        let file_name = format!(
            "backup-{}.{}",
            file_stamp(created_at),
            self.provider.extension()
        );
        let path = config.local_path.join(&file_name);

        info!(path = %path.display(), "Creating database snapshot");
        if let Err(e) = self.provider.dump(&path).await {
            if let Err(remove_err) = tokio::fs::remove_file(&path).await {
                debug!(error = %remove_err, "No partial snapshot to remove");
            }
            return Err(e);
        }

        let size_bytes = tokio::fs::metadata(&path).await?.len();
        let mirrored_to = match &config.external_path {
            Some(external) => mirror(&path, &file_name, external).await,
            None => None,
        };

        let record = SnapshotRecord {
            file_name,
            path,
            created_at,
            size_bytes,
            mirrored_to,
        };

        if let Err(e) = backup_config::record_snapshot(&self.pool, &record).await {
            warn!(error = %e, "Snapshot written but could not be recorded");
        }

        info!(
            file = %record.file_name,
            size_bytes = record.size_bytes,
            mirrored = record.mirrored_to.is_some(),
            "Snapshot complete"
        );
        Ok(record)
    }

    pub async fn restore_snapshot(&self, file: &Path) -> Result<(), SnapshotError> {
        if !tokio::fs::try_exists(file).await? {
            return Err(SnapshotError::MissingFile(file.to_path_buf()));
        }
        info!(path = %file.display(), "Restoring database snapshot");
        self.provider.restore(file).await
    }
}

/// Copy the snapshot to `external` only when that directory already exists.
async fn mirror(path: &Path, file_name: &str, external: &Path) -> Option<PathBuf> {
    match tokio::fs::metadata(external).await {
        Ok(meta) if meta.is_dir() => {
            let target = external.join(file_name);
            match tokio::fs::copy(path, &target).await {
                Ok(_) => Some(target),
                Err(e) => {
                    warn!(external = %external.display(), error = %e, "Failed to mirror snapshot");
                    None
                }
            }
        }
        _ => {
            warn!(external = %external.display(), "External backup path not available, skipping mirror");
            None
        }
    }
}
