//! One CSV file per entity.

use std::path::{Path, PathBuf};

use db::models::{
    category::Category, config::Config, consignment::ConsignmentWithItems, customer::Customer,
    delivery::Delivery, invoice::Invoice, order::OrderWithItems, product::Product,
    subscription::SubscriptionWithItems, user::User,
};
use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;

use super::{csv_record::BackupRecord, entity::EntityKind};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportReport {
    pub entity: EntityKind,
    pub file: PathBuf,
    pub rows: usize,
}

#[derive(Clone)]
pub struct EntityExporter {
    pool: SqlitePool,
}

impl EntityExporter {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Write `<entity>_<stamp>.csv` into `dir`, creating the directory if needed.
    pub async fn export_entity(
        &self,
        kind: EntityKind,
        dir: &Path,
        stamp: &str,
    ) -> Result<ExportReport, ExportError> {
        match kind {
            EntityKind::Config => self.export::<Config>(dir, stamp).await,
            EntityKind::Categories => self.export::<Category>(dir, stamp).await,
            EntityKind::Products => self.export::<Product>(dir, stamp).await,
            EntityKind::Customers => self.export::<Customer>(dir, stamp).await,
            EntityKind::Users => self.export::<User>(dir, stamp).await,
            EntityKind::Orders => self.export::<OrderWithItems>(dir, stamp).await,
            EntityKind::Invoices => self.export::<Invoice>(dir, stamp).await,
            EntityKind::Subscriptions => self.export::<SubscriptionWithItems>(dir, stamp).await,
            EntityKind::Consignments => self.export::<ConsignmentWithItems>(dir, stamp).await,
            EntityKind::Deliveries => self.export::<Delivery>(dir, stamp).await,
        }
    }

    async fn export<T: BackupRecord>(&self, dir: &Path, stamp: &str) -> Result<ExportReport, ExportError> {
        let records = T::load_all(&self.pool).await?;
        let bytes = encode_csv(&records)?;

        tokio::fs::create_dir_all(dir).await?;
        let file = dir.join(T::KIND.file_name(stamp));
        tokio::fs::write(&file, bytes).await?;

        info!(entity = %T::KIND, rows = records.len(), file = %file.display(), "Exported entity");
        Ok(ExportReport {
            entity: T::KIND,
            file,
            rows: records.len(),
        })
    }
}

/// Header row plus one row per record. Cells are quoted only when they
/// contain a delimiter, quote or line break.
pub fn encode_csv<T: BackupRecord>(records: &[T]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(Vec::new());

    writer.write_record(T::COLUMNS)?;
    for record in records {
        writer.write_record(record.to_csv_row())?;
    }

    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}
