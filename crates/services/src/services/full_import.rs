//! Restores a whole export directory, entity by entity in dependency order.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{error, info, warn};

use super::{
    csv_import::{CsvImporter, ImportOptions, ImportReport},
    entity::EntityKind,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EntityImportState {
    Imported { report: ImportReport },
    Failed { file: Option<PathBuf>, message: String },
    /// No file for this entity in the directory.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportOutcome {
    Succeeded,
    PartiallySucceeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityImportResult {
    pub entity: EntityKind,
    #[serde(flatten)]
    pub state: EntityImportState,
}

#[derive(Debug, Clone, Serialize)]
pub struct FullImportReport {
    pub directory: PathBuf,
    pub outcome: ImportOutcome,
    pub dry_run: bool,
    pub entities: Vec<EntityImportResult>,
}

impl FullImportReport {
    pub fn imported_count(&self) -> usize {
        self.count(|s| matches!(s, EntityImportState::Imported { .. }))
    }

    pub fn failed_count(&self) -> usize {
        self.count(|s| matches!(s, EntityImportState::Failed { .. }))
    }

    pub fn skipped_count(&self) -> usize {
        self.count(|s| matches!(s, EntityImportState::Skipped))
    }

    pub fn row_error_count(&self) -> usize {
        self.entities
            .iter()
            .map(|e| match &e.state {
                EntityImportState::Imported { report } => report.errors.len(),
                _ => 0,
            })
            .sum()
    }

    pub fn summary(&self) -> String {
        format!(
            "{:?}: {} imported, {} failed, {} skipped, {} row errors",
            self.outcome,
            self.imported_count(),
            self.failed_count(),
            self.skipped_count(),
            self.row_error_count()
        )
    }

    fn count(&self, pred: impl Fn(&EntityImportState) -> bool) -> usize {
        self.entities.iter().filter(|e| pred(&e.state)).count()
    }
}

fn outcome(imported: usize, failed: usize, row_errors: usize) -> ImportOutcome {
    match (imported, failed + row_errors) {
        (0, _) => ImportOutcome::Failed,
        (_, 0) => ImportOutcome::Succeeded,
        _ => ImportOutcome::PartiallySucceeded,
    }
}

/// The export of `kind` inside `dir`. When several match, the
/// lexicographically greatest name (the most recent stamp) wins.
pub async fn locate_entity_file(dir: &Path, kind: EntityKind) -> std::io::Result<Option<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut best: Option<String> = None;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if kind.matches_file(&name) && best.as_ref().is_none_or(|b| name > *b) {
            best = Some(name);
        }
    }
    Ok(best.map(|name| dir.join(name)))
}

#[derive(Clone)]
pub struct FullImporter {
    importer: CsvImporter,
}

impl FullImporter {
    pub fn new(importer: CsvImporter) -> Self {
        Self { importer }
    }

    /// Import every entity found in `dir`. Never fails as a whole: problems
    /// are recorded per entity and summarised in the outcome.
    pub async fn import_directory(&self, dir: &Path, options: ImportOptions) -> FullImportReport {
        let mut entities = Vec::with_capacity(EntityKind::IMPORT_ORDER.len());

        for kind in EntityKind::IMPORT_ORDER {
            let state = match locate_entity_file(dir, kind).await {
                Ok(None) => {
                    info!(entity = %kind, "No file found, skipping");
                    EntityImportState::Skipped
                }
                Ok(Some(file)) => match self.importer.import_file(kind, &file, options).await {
                    Ok(report) => {
                        if report.has_errors() {
                            warn!(entity = %kind, errors = report.errors.len(), "Entity imported with row errors");
                        }
                        EntityImportState::Imported { report }
                    }
                    Err(e) => {
                        error!(entity = %kind, file = %file.display(), error = %e, "Entity import failed");
                        EntityImportState::Failed {
                            file: Some(file),
                            message: e.to_string(),
                        }
                    }
                },
                Err(e) => {
                    error!(entity = %kind, dir = %dir.display(), error = %e, "Cannot read backup directory");
                    EntityImportState::Failed {
                        file: None,
                        message: e.to_string(),
                    }
                }
            };
            entities.push(EntityImportResult { entity: kind, state });
        }

        let mut report = FullImportReport {
            directory: dir.to_path_buf(),
            outcome: ImportOutcome::Failed,
            dry_run: options.dry_run,
            entities,
        };
        report.outcome = outcome(
            report.imported_count(),
            report.failed_count(),
            report.row_error_count(),
        );
        info!(summary = %report.summary(), "Full import finished");
        report
    }
}
