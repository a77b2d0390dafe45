//! Cell-level CSV encoding shared by the exporter and the importer, and the
//! per-entity `BackupRecord` descriptor both of them are driven by.

use std::{collections::HashMap, str::FromStr};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use csv::StringRecord;
use serde::{Serialize, de::DeserializeOwned};
use sqlx::{SqliteConnection, SqlitePool};
use thiserror::Error;
use uuid::Uuid;

use super::entity::EntityKind;

#[derive(Debug, Error)]
pub enum FieldError {
    #[error("missing value for column '{0}'")]
    Missing(&'static str),
    #[error("invalid value '{value}' for column '{column}': {reason}")]
    Invalid {
        column: &'static str,
        value: String,
        reason: String,
    },
    #[error("{0}")]
    Constraint(String),
}

/// Column name to position, built once from a file's header row.
#[derive(Debug, Clone, Default)]
pub struct HeaderIndex {
    positions: HashMap<String, usize>,
}

impl HeaderIndex {
    pub fn new(headers: &StringRecord) -> Self {
        let positions = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_string(), i))
            .collect();
        Self { positions }
    }

    pub fn contains(&self, column: &str) -> bool {
        self.positions.contains_key(column)
    }

    /// Columns from `required` that the header does not carry.
    pub fn missing<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
        required
            .iter()
            .copied()
            .filter(|column| !self.contains(column))
            .collect()
    }

    fn position(&self, column: &str) -> Option<usize> {
        self.positions.get(column).copied()
    }
}

/// One data row, addressed by column name.
pub struct CsvRow<'a> {
    headers: &'a HeaderIndex,
    record: &'a StringRecord,
}

impl<'a> CsvRow<'a> {
    pub fn new(headers: &'a HeaderIndex, record: &'a StringRecord) -> Self {
        Self { headers, record }
    }

    /// Raw cell text, `None` only when the column is absent.
    pub fn cell(&self, column: &str) -> Option<&'a str> {
        self.headers
            .position(column)
            .and_then(|i| self.record.get(i))
    }

    /// Raw cell text, `None` when the column is absent or the cell is empty.
    pub fn raw(&self, column: &str) -> Option<&'a str> {
        self.cell(column).filter(|value| !value.is_empty())
    }

    /// An empty cell counts as missing unless `T` is text.
    pub fn required<T: FromCell>(&self, column: &'static str) -> Result<T, FieldError> {
        let value = self
            .cell(column)
            .filter(|value| T::ACCEPTS_EMPTY || !value.is_empty())
            .ok_or(FieldError::Missing(column))?;
        T::from_cell(value).map_err(|reason| FieldError::Invalid {
            column,
            value: value.to_string(),
            reason,
        })
    }

    /// An empty cell is `None`; see [`ToCell::to_nullable_cell`] for text.
    pub fn optional<T: FromCell>(&self, column: &'static str) -> Result<Option<T>, FieldError> {
        match self.raw(column) {
            None => Ok(None),
            Some(value) => T::from_nullable_cell(value)
                .map(Some)
                .map_err(|reason| FieldError::Invalid {
                    column,
                    value: value.to_string(),
                    reason,
                }),
        }
    }

    /// A strum-backed enum column.
    pub fn variant<T>(&self, column: &'static str) -> Result<T, FieldError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let value = self.raw(column).ok_or(FieldError::Missing(column))?;
        value.parse::<T>().map_err(|e| FieldError::Invalid {
            column,
            value: value.to_string(),
            reason: e.to_string(),
        })
    }

    /// A JSON-encoded nested collection. An empty cell decodes as the default.
    pub fn json<T: DeserializeOwned + Default>(&self, column: &'static str) -> Result<T, FieldError> {
        match self.raw(column) {
            None => Ok(T::default()),
            Some(value) => serde_json::from_str(value).map_err(|e| FieldError::Invalid {
                column,
                value: value.chars().take(80).collect(),
                reason: e.to_string(),
            }),
        }
    }
}

/// Text form of a value inside a CSV cell.
pub trait ToCell {
    fn to_cell(&self) -> String;

    /// Cell text for a `Some` value in a nullable column, where an empty
    /// cell already means `None`.
    fn to_nullable_cell(&self) -> String {
        self.to_cell()
    }
}

impl ToCell for String {
    fn to_cell(&self) -> String {
        self.clone()
    }

    // `Some("")` is written as a lone backslash; text that already starts
    // with one gets a second.
    fn to_nullable_cell(&self) -> String {
        if self.is_empty() || self.starts_with('\\') {
            format!("\\{self}")
        } else {
            self.clone()
        }
    }
}

impl ToCell for str {
    fn to_cell(&self) -> String {
        self.to_string()
    }
}

impl ToCell for bool {
    fn to_cell(&self) -> String {
        self.to_string()
    }
}

impl ToCell for i32 {
    fn to_cell(&self) -> String {
        self.to_string()
    }
}

impl ToCell for i64 {
    fn to_cell(&self) -> String {
        self.to_string()
    }
}

impl ToCell for f64 {
    fn to_cell(&self) -> String {
        self.to_string()
    }
}

impl ToCell for Uuid {
    fn to_cell(&self) -> String {
        self.to_string()
    }
}

impl ToCell for DateTime<Utc> {
    fn to_cell(&self) -> String {
        self.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }
}

impl<T: ToCell> ToCell for Option<T> {
    fn to_cell(&self) -> String {
        self.as_ref().map(ToCell::to_nullable_cell).unwrap_or_default()
    }
}

/// Parse a cell back into a value. Errors carry a short human reason.
pub trait FromCell: Sized {
    /// Whether an empty cell is a value rather than a missing one.
    const ACCEPTS_EMPTY: bool = false;

    fn from_cell(value: &str) -> Result<Self, String>;

    /// Inverse of [`ToCell::to_nullable_cell`] for a non-empty cell.
    fn from_nullable_cell(value: &str) -> Result<Self, String> {
        Self::from_cell(value)
    }
}

impl FromCell for String {
    const ACCEPTS_EMPTY: bool = true;

    fn from_cell(value: &str) -> Result<Self, String> {
        Ok(value.to_string())
    }

    fn from_nullable_cell(value: &str) -> Result<Self, String> {
        Ok(value.strip_prefix('\\').unwrap_or(value).to_string())
    }
}

impl FromCell for bool {
    fn from_cell(value: &str) -> Result<Self, String> {
        match value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            other => Err(format!("expected a boolean, got '{other}'")),
        }
    }
}

impl FromCell for i32 {
    fn from_cell(value: &str) -> Result<Self, String> {
        value.trim().parse().map_err(|e| format!("{e}"))
    }
}

impl FromCell for i64 {
    fn from_cell(value: &str) -> Result<Self, String> {
        value.trim().parse().map_err(|e| format!("{e}"))
    }
}

impl FromCell for f64 {
    fn from_cell(value: &str) -> Result<Self, String> {
        let parsed: f64 = value.trim().parse().map_err(|e| format!("{e}"))?;
        if parsed.is_finite() {
            Ok(parsed)
        } else {
            Err("expected a finite number".to_string())
        }
    }
}

impl FromCell for Uuid {
    fn from_cell(value: &str) -> Result<Self, String> {
        Uuid::parse_str(value.trim()).map_err(|e| e.to_string())
    }
}

impl FromCell for DateTime<Utc> {
    fn from_cell(value: &str) -> Result<Self, String> {
        DateTime::parse_from_rfc3339(value.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| e.to_string())
    }
}

/// Encode a nested collection for a single cell.
pub fn json_cell<T: Serialize + ?Sized>(value: &T) -> String {
    // Serializing plain derive(Serialize) structs cannot fail.
    serde_json::to_string(value).unwrap_or_else(|_| "[]".to_string())
}

/// Declarative description of one backed-up entity: its CSV columns, how a
/// row maps to and from them, and how it is read from and written to the store.
#[async_trait]
pub trait BackupRecord: Sized + Send + Sync + 'static {
    const KIND: EntityKind;
    /// Header row, in export order.
    const COLUMNS: &'static [&'static str];

    fn id(&self) -> Uuid;

    /// Cells in `COLUMNS` order.
    fn to_csv_row(&self) -> Vec<String>;

    fn from_csv_row(row: &CsvRow<'_>) -> Result<Self, FieldError>;

    async fn load_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error>;

    async fn insert_row(&self, conn: &mut SqliteConnection) -> Result<(), sqlx::Error>;

    async fn update_row(&self, conn: &mut SqliteConnection) -> Result<(), sqlx::Error>;

    /// Whether the store already holds this record. Matches on primary key
    /// unless the entity has a stronger natural key.
    async fn exists(&self, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
        let sql = format!("SELECT COUNT(*) FROM {} WHERE id = $1", Self::KIND.table());
        let count = sqlx::query_scalar::<_, i64>(&sql)
            .bind(self.id())
            .fetch_one(conn)
            .await?;
        Ok(count > 0)
    }
}
