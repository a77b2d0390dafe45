//! Restores one entity from a CSV file.

use std::path::{Path, PathBuf};

use db::models::{
    category::Category, config::Config, consignment::ConsignmentWithItems, customer::Customer,
    delivery::Delivery, invoice::Invoice, order::OrderWithItems, product::Product,
    subscription::SubscriptionWithItems, user::User,
};
use serde::Serialize;
use sqlx::{Acquire, SqliteConnection, SqlitePool};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    csv_record::{BackupRecord, CsvRow, HeaderIndex},
    entity::EntityKind,
};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("{entity} file is missing required columns: {}", columns.join(", "))]
    MissingColumns {
        entity: EntityKind,
        columns: Vec<String>,
    },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("no database to import into, only dry runs are possible")]
    Detached,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportOptions {
    /// Replace rows whose id already exists instead of skipping them.
    pub overwrite: bool,
    /// Parse and validate only; the store is not touched.
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowError {
    /// 1-based line in the file, header included.
    pub line: u64,
    pub id: Option<Uuid>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportReport {
    pub entity: EntityKind,
    pub file: PathBuf,
    pub records: usize,
    pub imported: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: Vec<RowError>,
    pub dry_run: bool,
}

impl ImportReport {
    fn new(entity: EntityKind, file: &Path, dry_run: bool) -> Self {
        Self {
            entity,
            file: file.to_path_buf(),
            records: 0,
            imported: 0,
            updated: 0,
            skipped: 0,
            errors: Vec::new(),
            dry_run,
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn summary(&self) -> String {
        let prefix = if self.dry_run { "dry run: " } else { "" };
        format!(
            "{prefix}{}: {} records, {} imported, {} updated, {} skipped, {} errors",
            self.entity,
            self.records,
            self.imported,
            self.updated,
            self.skipped,
            self.errors.len()
        )
    }
}

enum RowOutcome {
    Imported,
    Updated,
    Skipped,
}

#[derive(Clone)]
pub struct CsvImporter {
    pool: Option<SqlitePool>,
}

impl CsvImporter {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool: Some(pool) }
    }

    /// An importer without a store. Dry runs work as usual; real imports
    /// fail with [`ImportError::Detached`] after the file has been checked.
    pub fn detached() -> Self {
        Self { pool: None }
    }

    pub async fn import_file(
        &self,
        kind: EntityKind,
        path: &Path,
        options: ImportOptions,
    ) -> Result<ImportReport, ImportError> {
        match kind {
            EntityKind::Config => self.import::<Config>(path, options).await,
            EntityKind::Categories => self.import::<Category>(path, options).await,
            EntityKind::Products => self.import::<Product>(path, options).await,
            EntityKind::Customers => self.import::<Customer>(path, options).await,
            EntityKind::Users => self.import::<User>(path, options).await,
            EntityKind::Orders => self.import::<OrderWithItems>(path, options).await,
            EntityKind::Invoices => self.import::<Invoice>(path, options).await,
            EntityKind::Subscriptions => self.import::<SubscriptionWithItems>(path, options).await,
            EntityKind::Consignments => self.import::<ConsignmentWithItems>(path, options).await,
            EntityKind::Deliveries => self.import::<Delivery>(path, options).await,
        }
    }

    async fn import<T: BackupRecord>(
        &self,
        path: &Path,
        options: ImportOptions,
    ) -> Result<ImportReport, ImportError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| ImportError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut report = ImportReport::new(T::KIND, path, options.dry_run);
        let rows = decode_rows::<T>(&bytes, &mut report)?;

        if options.dry_run {
            info!(summary = %report.summary(), "Validated CSV without importing");
            return Ok(report);
        }

        let pool = self.pool.as_ref().ok_or(ImportError::Detached)?;
        let mut tx = pool.begin().await?;
        for (line, record) in rows {
            let mut savepoint = tx.begin().await?;
            match apply_row(&mut savepoint, &record, options.overwrite).await {
                Ok(outcome) => {
                    savepoint.commit().await?;
                    match outcome {
                        RowOutcome::Imported => report.imported += 1,
                        RowOutcome::Updated => report.updated += 1,
                        RowOutcome::Skipped => report.skipped += 1,
                    }
                }
                Err(e) => {
                    savepoint.rollback().await?;
                    warn!(entity = %T::KIND, line, id = %record.id(), error = %e, "Row import failed");
                    report.errors.push(RowError {
                        line,
                        id: Some(record.id()),
                        message: e.to_string(),
                    });
                }
            }
        }
        tx.commit().await?;

        info!(summary = %report.summary(), "Imported CSV");
        Ok(report)
    }
}

async fn apply_row<T: BackupRecord>(
    conn: &mut SqliteConnection,
    record: &T,
    overwrite: bool,
) -> Result<RowOutcome, sqlx::Error> {
    if record.exists(&mut *conn).await? {
        if !overwrite {
            debug!(entity = %T::KIND, id = %record.id(), "Record exists, skipping");
            return Ok(RowOutcome::Skipped);
        }
        record.update_row(&mut *conn).await?;
        Ok(RowOutcome::Updated)
    } else {
        record.insert_row(&mut *conn).await?;
        Ok(RowOutcome::Imported)
    }
}

/// Parse the whole file, recording undecodable rows in `report.errors`.
/// Header problems fail the import before anything is returned.
fn decode_rows<T: BackupRecord>(
    bytes: &[u8],
    report: &mut ImportReport,
) -> Result<Vec<(u64, T)>, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes);

    let headers = HeaderIndex::new(reader.headers()?);
    let missing = headers.missing(T::COLUMNS);
    if !missing.is_empty() {
        return Err(ImportError::MissingColumns {
            entity: T::KIND,
            columns: missing.into_iter().map(str::to_string).collect(),
        });
    }

    let mut rows = Vec::new();
    for result in reader.records() {
        report.records += 1;
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or_default();
                report.errors.push(RowError {
                    line,
                    id: None,
                    message: e.to_string(),
                });
                continue;
            }
        };
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let row = CsvRow::new(&headers, &record);
        match T::from_csv_row(&row) {
            Ok(decoded) => rows.push((line, decoded)),
            Err(e) => report.errors.push(RowError {
                line,
                id: row.raw("id").and_then(|id| Uuid::parse_str(id).ok()),
                message: e.to_string(),
            }),
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use db::{
        DBService,
        models::{
            consignment::{Consignment, ConsignmentItem, ConsignmentStatus},
            customer::CustomerType,
            delivery::DeliveryStatus,
            invoice::InvoiceStatus,
            order::{Order, OrderItem, OrderStatus},
            subscription::{Subscription, SubscriptionFrequency, SubscriptionItem, SubscriptionStatus},
            user::UserRole,
        },
    };
    use tempfile::TempDir;

    use super::*;
    use crate::services::entity_export::EntityExporter;

    const CATEGORY_CSV: &str = "\
id,name,description,created_at,updated_at
6f1c2a5e-0000-4000-8000-000000000001,Roses,\"Red, pink and white\",2025-03-01T10:30:00Z,2025-03-01T10:30:00Z
6f1c2a5e-0000-4000-8000-000000000002,Tulips,\"The \"\"Dutch\"\" kind\",2025-03-01T10:30:00Z,2025-03-01T10:30:00Z
6f1c2a5e-0000-4000-8000-000000000003,Greens,,2025-03-01T10:30:00Z,2025-03-01T10:30:00Z
";

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, 9, 15, 30).unwrap()
            + chrono::Duration::milliseconds(250)
    }

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    async fn category_count(db: &DBService) -> i64 {
        Category::count(&db.pool).await.unwrap()
    }

    #[tokio::test]
    async fn test_categories_import_into_empty_store() {
        let db = DBService::new_in_memory().await.unwrap();
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "categories_2025-03-01T10-30-00-000Z.csv", CATEGORY_CSV);

        let report = CsvImporter::new(db.pool.clone())
            .import_file(EntityKind::Categories, &path, ImportOptions::default())
            .await
            .unwrap();

        assert_eq!(report.records, 3);
        assert_eq!(report.imported, 3);
        assert_eq!(report.updated, 0);
        assert!(report.errors.is_empty());

        let categories = Category::find_all(&db.pool).await.unwrap();
        let roses = categories.iter().find(|c| c.name == "Roses").unwrap();
        assert_eq!(roses.description.as_deref(), Some("Red, pink and white"));
        let tulips = categories.iter().find(|c| c.name == "Tulips").unwrap();
        assert_eq!(tulips.description.as_deref(), Some("The \"Dutch\" kind"));
        let greens = categories.iter().find(|c| c.name == "Greens").unwrap();
        assert_eq!(greens.description, None);
    }

    #[tokio::test]
    async fn test_existing_rows_skip_or_update() {
        let db = DBService::new_in_memory().await.unwrap();
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "categories.csv", CATEGORY_CSV);
        let importer = CsvImporter::new(db.pool.clone());

        importer
            .import_file(EntityKind::Categories, &path, ImportOptions::default())
            .await
            .unwrap();
        let again = importer
            .import_file(EntityKind::Categories, &path, ImportOptions::default())
            .await
            .unwrap();
        assert_eq!((again.imported, again.updated, again.skipped), (0, 0, 3));

        let edited = CATEGORY_CSV.replace("Greens", "Foliage");
        let path = write(&dir, "categories_edited.csv", &edited);
        let overwrite = importer
            .import_file(
                EntityKind::Categories,
                &path,
                ImportOptions {
                    overwrite: true,
                    dry_run: false,
                },
            )
            .await
            .unwrap();
        assert_eq!((overwrite.imported, overwrite.updated, overwrite.skipped), (0, 3, 0));
        assert_eq!(category_count(&db).await, 3);
        assert!(
            Category::find_all(&db.pool)
                .await
                .unwrap()
                .iter()
                .any(|c| c.name == "Foliage")
        );
    }

    #[tokio::test]
    async fn test_dry_run_never_mutates() {
        let db = DBService::new_in_memory().await.unwrap();
        let dir = TempDir::new().unwrap();
        let importer = CsvImporter::new(db.pool.clone());
        let dry = ImportOptions {
            overwrite: true,
            dry_run: true,
        };

        let valid = write(&dir, "categories_ok.csv", CATEGORY_CSV);
        let report = importer.import_file(EntityKind::Categories, &valid, dry).await.unwrap();
        assert!(report.dry_run);
        assert_eq!(report.records, 3);
        assert_eq!(report.imported, 0);
        assert_eq!(category_count(&db).await, 0);

        let invalid = write(
            &dir,
            "categories_bad.csv",
            "id,name,description,created_at,updated_at\nnot-a-uuid,Roses,,yesterday,\n",
        );
        let report = importer.import_file(EntityKind::Categories, &invalid, dry).await.unwrap();
        assert_eq!(report.records, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].line, 2);
        assert_eq!(category_count(&db).await, 0);
    }

    #[tokio::test]
    async fn test_detached_importer_only_dry_runs() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "categories.csv", CATEGORY_CSV);
        let importer = CsvImporter::detached();

        let report = importer
            .import_file(
                EntityKind::Categories,
                &path,
                ImportOptions {
                    overwrite: false,
                    dry_run: true,
                },
            )
            .await
            .unwrap();
        assert_eq!(report.records, 3);
        assert!(!report.has_errors());

        let err = importer
            .import_file(EntityKind::Categories, &path, ImportOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::Detached));
    }

    #[tokio::test]
    async fn test_missing_columns_fail_before_mutation() {
        let db = DBService::new_in_memory().await.unwrap();
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "categories.csv",
            "id,name\n6f1c2a5e-0000-4000-8000-000000000001,Roses\n",
        );

        let err = CsvImporter::new(db.pool.clone())
            .import_file(EntityKind::Categories, &path, ImportOptions::default())
            .await
            .unwrap_err();

        match err {
            ImportError::MissingColumns { columns, .. } => {
                assert_eq!(columns, vec!["description", "created_at", "updated_at"])
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(category_count(&db).await, 0);
    }

    #[tokio::test]
    async fn test_column_order_is_free_and_extra_columns_ignored() {
        let db = DBService::new_in_memory().await.unwrap();
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "categories.csv",
            "legacy_flag,updated_at,name,id,description,created_at\n\
             x,2025-03-01T10:30:00Z,Roses,6f1c2a5e-0000-4000-8000-000000000001,,2025-03-01T10:30:00Z\n",
        );

        let report = CsvImporter::new(db.pool.clone())
            .import_file(EntityKind::Categories, &path, ImportOptions::default())
            .await
            .unwrap();
        assert_eq!(report.imported, 1);
    }

    #[tokio::test]
    async fn test_bad_rows_are_reported_and_good_rows_kept() {
        let db = DBService::new_in_memory().await.unwrap();
        let dir = TempDir::new().unwrap();
        // Second product references a category that does not exist.
        let path = write(
            &dir,
            "products.csv",
            "id,sku,name,description,category_id,price_50cm,price_60cm,price_70cm,stock,min_stock,active,created_at,updated_at\n\
             7a000000-0000-4000-8000-000000000001,ROS-RED,Red rose,,,1.1,1.3,1.5,100,10,true,2025-03-01T10:30:00Z,2025-03-01T10:30:00Z\n\
             7a000000-0000-4000-8000-000000000002,ROS-WHT,White rose,,6f1c2a5e-0000-4000-8000-0000000000ff,1.1,1.3,1.5,80,10,true,2025-03-01T10:30:00Z,2025-03-01T10:30:00Z\n\
             7a000000-0000-4000-8000-000000000003,ROS-PNK,Pink rose,,,abc,1.3,1.5,80,10,true,2025-03-01T10:30:00Z,2025-03-01T10:30:00Z\n\
             7a000000-0000-4000-8000-000000000004,ROS-YLW,Yellow rose,,,1.1,1.3\n",
        );

        let report = CsvImporter::new(db.pool.clone())
            .import_file(EntityKind::Products, &path, ImportOptions::default())
            .await
            .unwrap();

        assert_eq!(report.records, 4);
        assert_eq!(report.imported, 1);
        let lines: Vec<u64> = report.errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![4, 5, 3]);
        assert!(report.errors[0].message.contains("price_50cm"));
        assert_eq!(Product::count(&db.pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_consignment_over_settlement_is_rejected() {
        let db = DBService::new_in_memory().await.unwrap();
        let dir = TempDir::new().unwrap();
        let items = r#"[{""id"":""9c000000-0000-4000-8000-000000000001"",""consignment_id"":""9b000000-0000-4000-8000-000000000001"",""product_id"":""7a000000-0000-4000-8000-000000000001"",""delivered"":20,""sold"":15,""returned"":6,""unit_price"":0.5}]"#;
        let path = write(
            &dir,
            "consignments.csv",
            &format!(
                "id,customer_id,status,delivered_at,settled_at,items,created_at,updated_at\n\
                 9b000000-0000-4000-8000-000000000001,5c000000-0000-4000-8000-000000000001,open,2025-03-01T10:30:00Z,,\"{items}\",2025-03-01T10:30:00Z,2025-03-01T10:30:00Z\n"
            ),
        );

        let report = CsvImporter::new(db.pool.clone())
            .import_file(EntityKind::Consignments, &path, ImportOptions::default())
            .await
            .unwrap();

        assert_eq!(report.imported, 0);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].message.contains("exceeds delivered"));
    }

    /// Seeds one record of every entity, with awkward text in free-form fields.
    async fn seed_everything(db: &DBService) {
        let mut conn = db.pool.acquire().await.unwrap();
        let conn = &mut *conn;

        let config = Config {
            id: Uuid::new_v4(),
            key: "shop.footer".to_string(),
            value: "Open 8-17, \"fresh\" daily\nClosed Sundays".to_string(),
            created_at: at(1),
            updated_at: at(2),
        };
        config.insert(conn).await.unwrap();

        let category = Category {
            id: Uuid::new_v4(),
            name: "Roses".to_string(),
            description: Some(String::new()),
            created_at: at(1),
            updated_at: at(1),
        };
        category.insert(conn).await.unwrap();

        let product = Product {
            id: Uuid::new_v4(),
            sku: "ROS-RED".to_string(),
            name: "Red rose".to_string(),
            description: Some(r"\\nas\photos\red-rose.jpg".to_string()),
            category_id: Some(category.id),
            price_50cm: 0.85,
            price_60cm: 1.05,
            price_70cm: 1.25,
            stock: 400,
            min_stock: 50,
            active: true,
            created_at: at(1),
            updated_at: at(3),
        };
        product.insert(conn).await.unwrap();

        let customer = Customer {
            id: Uuid::new_v4(),
            name: "Bloom, Inc.".to_string(),
            email: Some("orders@bloom.example".to_string()),
            phone: Some(String::new()),
            address: Some("Main St 1\nUnit 4".to_string()),
            city: Some("Aalsmeer".to_string()),
            customer_type: CustomerType::Wholesale,
            created_at: at(1),
            updated_at: at(1),
        };
        customer.insert(conn).await.unwrap();

        let driver = User {
            id: Uuid::new_v4(),
            email: "driver@flowers.example".to_string(),
            name: String::new(),
            role: UserRole::Driver,
            active: true,
            created_at: at(1),
            updated_at: at(1),
        };
        driver.insert(conn).await.unwrap();

        let order_id = Uuid::new_v4();
        let order = OrderWithItems {
            order: Order {
                id: order_id,
                order_number: "ORD-0001".to_string(),
                customer_id: customer.id,
                status: OrderStatus::Confirmed,
                total: 21.0,
                notes: Some("Ring twice, then \"knock\"".to_string()),
                created_at: at(4),
                updated_at: at(4),
            },
            items: vec![OrderItem {
                id: Uuid::new_v4(),
                order_id,
                product_id: product.id,
                quantity: 20,
                stem_length: 60,
                unit_price: 1.05,
            }],
        };
        order.insert(conn).await.unwrap();

        let invoice = Invoice {
            id: Uuid::new_v4(),
            invoice_number: "INV-0001".to_string(),
            customer_id: customer.id,
            order_id: Some(order_id),
            amount: 21.0,
            status: InvoiceStatus::Sent,
            due_date: at(20),
            paid_at: None,
            created_at: at(4),
            updated_at: at(4),
        };
        invoice.insert(conn).await.unwrap();

        let subscription_id = Uuid::new_v4();
        let subscription = SubscriptionWithItems {
            subscription: Subscription {
                id: subscription_id,
                customer_id: customer.id,
                frequency: SubscriptionFrequency::Biweekly,
                status: SubscriptionStatus::Active,
                next_delivery: at(14),
                created_at: at(1),
                updated_at: at(1),
            },
            items: vec![SubscriptionItem {
                id: Uuid::new_v4(),
                subscription_id,
                product_id: product.id,
                quantity: 50,
                stem_length: 70,
            }],
        };
        subscription.insert(conn).await.unwrap();

        let consignment_id = Uuid::new_v4();
        let consignment = ConsignmentWithItems {
            consignment: Consignment {
                id: consignment_id,
                customer_id: customer.id,
                status: ConsignmentStatus::Open,
                delivered_at: at(5),
                settled_at: None,
                created_at: at(5),
                updated_at: at(5),
            },
            items: vec![ConsignmentItem {
                id: Uuid::new_v4(),
                consignment_id,
                product_id: product.id,
                delivered: 20,
                sold: 15,
                returned: 5,
                unit_price: 0.5,
            }],
        };
        consignment.insert(conn).await.unwrap();

        let delivery = Delivery {
            id: Uuid::new_v4(),
            order_id,
            driver_id: Some(driver.id),
            status: DeliveryStatus::InTransit,
            scheduled_for: at(6),
            delivered_at: None,
            address: "Main St 1, Unit 4".to_string(),
            route_position: Some(3),
            notes: Some(String::new()),
            created_at: at(6),
            updated_at: at(6),
        };
        delivery.insert(conn).await.unwrap();
    }

    async fn snapshot_all(db: &DBService) -> serde_json::Value {
        serde_json::json!({
            "config": Config::find_all(&db.pool).await.unwrap(),
            "categories": Category::find_all(&db.pool).await.unwrap(),
            "products": Product::find_all(&db.pool).await.unwrap(),
            "customers": Customer::find_all(&db.pool).await.unwrap(),
            "users": User::find_all(&db.pool).await.unwrap(),
            "orders": OrderWithItems::find_all(&db.pool).await.unwrap(),
            "invoices": Invoice::find_all(&db.pool).await.unwrap(),
            "subscriptions": SubscriptionWithItems::find_all(&db.pool).await.unwrap(),
            "consignments": ConsignmentWithItems::find_all(&db.pool).await.unwrap(),
            "deliveries": Delivery::find_all(&db.pool).await.unwrap(),
        })
    }

    #[tokio::test]
    async fn test_export_then_import_round_trips_every_entity() {
        let source = DBService::new_in_memory().await.unwrap();
        seed_everything(&source).await;
        let dir = TempDir::new().unwrap();
        let stamp = "2025-03-06T12-00-00-000Z";

        let exporter = EntityExporter::new(source.pool.clone());
        for kind in EntityKind::IMPORT_ORDER {
            exporter.export_entity(kind, dir.path(), stamp).await.unwrap();
        }

        let target = DBService::new_in_memory().await.unwrap();
        let importer = CsvImporter::new(target.pool.clone());
        let options = ImportOptions {
            overwrite: true,
            dry_run: false,
        };
        for kind in EntityKind::IMPORT_ORDER {
            let report = importer
                .import_file(kind, &dir.path().join(kind.file_name(stamp)), options)
                .await
                .unwrap();
            assert!(report.errors.is_empty(), "{kind}: {:?}", report.errors);
            assert_eq!(report.imported, 1, "{kind}");
        }

        assert_eq!(snapshot_all(&source).await, snapshot_all(&target).await);

        // Importing again over the restored store only updates.
        for kind in EntityKind::IMPORT_ORDER {
            let report = importer
                .import_file(kind, &dir.path().join(kind.file_name(stamp)), options)
                .await
                .unwrap();
            assert_eq!((report.imported, report.updated), (0, 1), "{kind}");
        }
        assert_eq!(snapshot_all(&source).await, snapshot_all(&target).await);
    }

    #[tokio::test]
    async fn test_config_rows_match_on_key() {
        let db = DBService::new_in_memory().await.unwrap();
        Config::upsert(&db.pool, "backup.retention_days", "30").await.unwrap();
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "config.csv",
            "id,key,value,created_at,updated_at\n\
             1e000000-0000-4000-8000-000000000001,backup.retention_days,14,2025-03-01T10:30:00Z,2025-03-01T10:30:00Z\n",
        );
        let importer = CsvImporter::new(db.pool.clone());

        let skipped = importer
            .import_file(EntityKind::Config, &path, ImportOptions::default())
            .await
            .unwrap();
        assert_eq!(skipped.skipped, 1);

        let updated = importer
            .import_file(
                EntityKind::Config,
                &path,
                ImportOptions {
                    overwrite: true,
                    dry_run: false,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.updated, 1);
        let row = Config::find_by_key(&db.pool, "backup.retention_days")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.value, "14");
    }
}
