//! "Export all": every entity into one timestamped directory, then zipped.

use std::{
    fs::File,
    io,
    path::{Path, PathBuf},
};

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};
use utils::timestamp::file_stamp;
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

use super::{entity::EntityKind, entity_export::EntityExporter};

pub const README_FILE: &str = "README.txt";

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("archive task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BundleEntryStatus {
    Exported { file: PathBuf, rows: usize },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BundleEntry {
    pub entity: EntityKind,
    #[serde(flatten)]
    pub status: BundleEntryStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct BundleReport {
    pub directory: PathBuf,
    pub archive: PathBuf,
    pub entities: Vec<BundleEntry>,
}

impl BundleReport {
    pub fn failed(&self) -> impl Iterator<Item = &BundleEntry> {
        self.entities
            .iter()
            .filter(|e| matches!(e.status, BundleEntryStatus::Failed { .. }))
    }

    pub fn all_exported(&self) -> bool {
        self.failed().next().is_none()
    }
}

/// Export every entity concurrently into `root/full-backup-<stamp>/`, add a
/// README, and zip the directory to `root/full-backup-<stamp>.zip`.
pub async fn export_all(exporter: &EntityExporter, root: &Path) -> Result<BundleReport, BundleError> {
    let stamp = file_stamp(Utc::now());
    let bundle_name = format!("full-backup-{stamp}");
    let directory = root.join(&bundle_name);
    tokio::fs::create_dir_all(&directory).await?;

    let exports = EntityKind::IMPORT_ORDER
        .into_iter()
        .map(|kind| exporter.export_entity(kind, &directory, &stamp));
    let results = join_all(exports).await;

    let entities: Vec<BundleEntry> = EntityKind::IMPORT_ORDER
        .into_iter()
        .zip(results)
        .map(|(entity, result)| {
            let status = match result {
                Ok(report) => BundleEntryStatus::Exported {
                    file: report.file,
                    rows: report.rows,
                },
                Err(e) => {
                    error!(entity = %entity, error = %e, "Entity export failed");
                    BundleEntryStatus::Failed {
                        error: e.to_string(),
                    }
                }
            };
            BundleEntry { entity, status }
        })
        .collect();

    tokio::fs::write(directory.join(README_FILE), readme(&stamp, &entities)).await?;

    let archive = root.join(format!("{bundle_name}.zip"));
    let (source, target, prefix) = (directory.clone(), archive.clone(), bundle_name.clone());
    tokio::task::spawn_blocking(move || zip_directory(&source, &target, &prefix)).await??;

    info!(
        archive = %archive.display(),
        failed = entities.iter().filter(|e| matches!(e.status, BundleEntryStatus::Failed { .. })).count(),
        "Full backup bundle written"
    );

    Ok(BundleReport {
        directory,
        archive,
        entities,
    })
}

fn readme(stamp: &str, entities: &[BundleEntry]) -> String {
    let mut text = format!(
        "Full CSV backup {stamp}\n\
         \n\
         Each <entity>_{stamp}.csv file holds one table. Order, subscription and\n\
         consignment rows carry their line items as JSON in the `items` column.\n\
         \n\
         Restore everything (files are applied in dependency order):\n\
         \n\
         \x20   restore-from-csv full <this directory> --overwrite\n\
         \n\
         Restore a single entity:\n\
         \n\
         \x20   restore-from-csv entity products products_{stamp}.csv --overwrite\n\
         \n\
         Check the files without touching the database:\n\
         \n\
         \x20   restore-from-csv verify <this directory>\n\
         \x20   restore-from-csv full <this directory> --dry-run\n\
         \n\
         Contents:\n"
    );
    for entry in entities {
        let line = match &entry.status {
            BundleEntryStatus::Exported { rows, .. } => format!("  {:<14} {rows} rows\n", entry.entity.to_string()),
            BundleEntryStatus::Failed { error } => format!("  {:<14} FAILED: {error}\n", entry.entity.to_string()),
        };
        text.push_str(&line);
    }
    text
}

fn zip_directory(source: &Path, target: &Path, prefix: &str) -> Result<(), BundleError> {
    let mut names: Vec<String> = std::fs::read_dir(source)?
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();

    let mut zip = ZipWriter::new(File::create(target)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.add_directory(format!("{prefix}/"), options)?;
    for name in names {
        zip.start_file(format!("{prefix}/{name}"), options)?;
        let mut file = File::open(source.join(&name))?;
        io::copy(&mut file, &mut zip)?;
    }
    zip.finish()?;
    Ok(())
}
