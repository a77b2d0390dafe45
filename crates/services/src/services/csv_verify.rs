//! Structural checks on a directory of CSV exports, without a database.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use super::{csv_record::HeaderIndex, entity::EntityKind, records::columns_for};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileCheck {
    pub file: PathBuf,
    /// Entity recognised from the file name prefix.
    pub entity: Option<EntityKind>,
    pub columns: usize,
    pub rows: usize,
    pub missing_columns: Vec<String>,
    pub problems: Vec<String>,
}

impl FileCheck {
    pub fn passed(&self) -> bool {
        self.missing_columns.is_empty() && self.problems.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyReport {
    pub directory: PathBuf,
    pub files: Vec<FileCheck>,
}

impl VerifyReport {
    pub fn passed(&self) -> bool {
        !self.files.is_empty() && self.files.iter().all(FileCheck::passed)
    }

    pub fn failed_count(&self) -> usize {
        self.files.iter().filter(|f| !f.passed()).count()
    }
}

/// Check every `*.csv` directly inside `dir`.
pub async fn verify_directory(dir: &Path) -> std::io::Result<VerifyReport> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file() && path.extension().is_some_and(|ext| ext == "csv") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let check = match tokio::fs::read(&path).await {
            Ok(bytes) => verify_bytes(&path, &bytes),
            Err(e) => FileCheck {
                file: path.clone(),
                entity: None,
                columns: 0,
                rows: 0,
                missing_columns: Vec::new(),
                problems: vec![format!("cannot read file: {e}")],
            },
        };
        if !check.passed() {
            warn!(file = %check.file.display(), problems = ?check.problems, missing = ?check.missing_columns, "CSV check failed");
        }
        files.push(check);
    }

    let report = VerifyReport {
        directory: dir.to_path_buf(),
        files,
    };
    info!(
        dir = %dir.display(),
        files = report.files.len(),
        failed = report.failed_count(),
        "CSV verification finished"
    );
    Ok(report)
}

fn verify_bytes(path: &Path, bytes: &[u8]) -> FileCheck {
    let entity = path
        .file_name()
        .and_then(|name| EntityKind::from_file_name(&name.to_string_lossy()));
    let mut check = FileCheck {
        file: path.to_path_buf(),
        entity,
        columns: 0,
        rows: 0,
        missing_columns: Vec::new(),
        problems: Vec::new(),
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers = match reader.headers() {
        Ok(headers) => headers.clone(),
        Err(e) => {
            check.problems.push(format!("unreadable header: {e}"));
            return check;
        }
    };
    if headers.iter().all(|h| h.trim().is_empty()) {
        check.problems.push("empty header row".to_string());
        return check;
    }
    check.columns = headers.len();

    if let Some(kind) = entity {
        check.missing_columns = HeaderIndex::new(&headers)
            .missing(columns_for(kind))
            .into_iter()
            .map(str::to_string)
            .collect();
    }

    for result in reader.records() {
        check.rows += 1;
        match result {
            Ok(record) if record.len() != check.columns => {
                let line = record.position().map(|p| p.line()).unwrap_or_default();
                check.problems.push(format!(
                    "line {line}: expected {} fields, found {}",
                    check.columns,
                    record.len()
                ));
            }
            Ok(_) => {}
            Err(e) => check.problems.push(e.to_string()),
        }
    }
    check
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_verify_reports_per_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("categories_2025-03-01T10-30-00-000Z.csv"),
            "id,name,description,created_at,updated_at\n1,Roses,\"a, b\",x,y\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("products_2025-03-01T10-30-00-000Z.csv"),
            "id,sku,name\n1,ROS,Rose\n2,TUL\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("empty.csv"), "").unwrap();
        std::fs::write(dir.path().join("README.txt"), "not csv").unwrap();

        let report = verify_directory(dir.path()).await.unwrap();
        assert_eq!(report.files.len(), 3);
        assert!(!report.passed());

        let categories = &report.files[0];
        assert_eq!(categories.entity, Some(EntityKind::Categories));
        assert_eq!(categories.rows, 1);
        assert!(categories.passed());

        let empty = &report.files[1];
        assert_eq!(empty.entity, None);
        assert_eq!(empty.problems, vec!["empty header row"]);

        let products = &report.files[2];
        assert_eq!(products.rows, 2);
        assert!(products.missing_columns.contains(&"price_50cm".to_string()));
        assert_eq!(products.problems, vec!["line 3: expected 3 fields, found 2"]);
    }

    #[tokio::test]
    async fn test_verify_empty_directory_does_not_pass() {
        let dir = TempDir::new().unwrap();
        let report = verify_directory(dir.path()).await.unwrap();
        assert!(report.files.is_empty());
        assert!(!report.passed());
    }
}
