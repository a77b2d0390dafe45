//! `restore-from-csv`: rebuild the store from CSV exports.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use db::DBService;
use services::services::{
    csv_import::{CsvImporter, ImportOptions},
    csv_verify::verify_directory,
    database_validator::DatabaseValidator,
    entity::EntityKind,
    full_import::{EntityImportState, FullImporter, ImportOutcome},
};
use tracing::{info, warn};
use utils::response::OperationResult;

use crate::{DEFAULT_DATABASE_URL, open_store, output::CommandOutput, parse_entity};

/// Restore the flower wholesale database from CSV backups
#[derive(Parser, Debug)]
#[command(name = "restore-from-csv")]
#[command(author, version, about, long_about = None)]
pub struct RestoreCli {
    /// Database to restore into
    #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL, global = true)]
    pub database_url: String,

    /// Print the result as a JSON `{success, message, data}` envelope
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: RestoreCommand,
}

#[derive(Subcommand, Debug)]
pub enum RestoreCommand {
    /// Restore every entity found in a full-backup directory
    Full {
        directory: PathBuf,
        /// Validate only, do not write
        #[arg(long)]
        dry_run: bool,
        /// Replace records that already exist
        #[arg(long)]
        overwrite: bool,
    },
    /// Restore a single entity from one CSV file
    Entity {
        #[arg(value_parser = parse_entity)]
        entity: EntityKind,
        file: PathBuf,
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        overwrite: bool,
    },
    /// Check the CSV files in a directory without touching the database
    Verify { directory: PathBuf },
}

/// Run the command and print its result. Returns whether it succeeded.
pub async fn run(cli: RestoreCli) -> bool {
    let output = match execute(&cli).await {
        Ok(output) => output,
        Err(e) => CommandOutput::error(&e),
    };
    output.print(cli.json);
    output.success
}

async fn check_schema(db: &DBService) -> anyhow::Result<()> {
    let validation = DatabaseValidator::new(db.pool.clone()).validate().await?;
    if !validation.is_ok() {
        anyhow::bail!(validation.summary());
    }
    Ok(())
}

pub async fn execute(cli: &RestoreCli) -> anyhow::Result<CommandOutput> {
    match &cli.command {
        RestoreCommand::Full {
            directory,
            dry_run,
            overwrite,
        } => {
            if !directory.is_dir() {
                anyhow::bail!("{} is not a directory", directory.display());
            }
            let importer = if *dry_run {
                // Only look at an existing store, and never write to it.
                match DBService::connect_existing(&cli.database_url).await {
                    Ok(db) => check_schema(&db).await?,
                    Err(e) => warn!(error = %e, "No readable database, schema not checked"),
                }
                CsvImporter::detached()
            } else {
                let db = open_store(&cli.database_url).await?;
                check_schema(&db).await?;
                CsvImporter::new(db.pool.clone())
            };

            let options = ImportOptions {
                overwrite: *overwrite,
                dry_run: *dry_run,
            };
            info!(directory = %directory.display(), ?options, "Starting full restore");
            let report = FullImporter::new(importer)
                .import_directory(directory, options)
                .await;

            let mut text = String::new();
            for entity in &report.entities {
                let line = match &entity.state {
                    EntityImportState::Imported { report } => report.summary(),
                    EntityImportState::Failed { message, .. } => {
                        format!("{}: FAILED: {message}", entity.entity)
                    }
                    EntityImportState::Skipped => format!("{}: no file, skipped", entity.entity),
                };
                text.push_str(&line);
                text.push('\n');
            }
            text.push_str(&report.summary());

            let summary = report.summary();
            let result = if report.outcome == ImportOutcome::Succeeded {
                OperationResult::success_with_message(report, summary)
            } else {
                OperationResult::failure_with_data(report, summary)
            };
            Ok(CommandOutput::new(&result, text))
        }
        RestoreCommand::Entity {
            entity,
            file,
            dry_run,
            overwrite,
        } => {
            let importer = if *dry_run {
                CsvImporter::detached()
            } else {
                CsvImporter::new(open_store(&cli.database_url).await?.pool)
            };
            let options = ImportOptions {
                overwrite: *overwrite,
                dry_run: *dry_run,
            };
            let report = importer
                .import_file(*entity, file, options)
                .await
                .with_context(|| format!("failed to import {entity} from {}", file.display()))?;

            let mut text = report.summary();
            for error in &report.errors {
                text.push_str(&format!("\n  line {}: {}", error.line, error.message));
            }
            let summary = report.summary();
            let result = if report.has_errors() {
                OperationResult::failure_with_data(report, summary)
            } else {
                OperationResult::success_with_message(report, summary)
            };
            Ok(CommandOutput::new(&result, text))
        }
        RestoreCommand::Verify { directory } => {
            let report = verify_directory(directory)
                .await
                .with_context(|| format!("cannot read {}", directory.display()))?;

            let mut text = String::new();
            for file in &report.files {
                let name = file
                    .file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let status = if file.passed() { "ok" } else { "FAILED" };
                text.push_str(&format!("{name}: {status} ({} rows)\n", file.rows));
                if !file.missing_columns.is_empty() {
                    text.push_str(&format!("  missing columns: {}\n", file.missing_columns.join(", ")));
                }
                for problem in &file.problems {
                    text.push_str(&format!("  {problem}\n"));
                }
            }
            let summary = format!(
                "{} files checked, {} failed",
                report.files.len(),
                report.failed_count()
            );
            text.push_str(&summary);

            let result = if report.passed() {
                OperationResult::success_with_message(report, summary)
            } else {
                OperationResult::failure_with_data(report, summary)
            };
            Ok(CommandOutput::new(&result, text))
        }
    }
}
