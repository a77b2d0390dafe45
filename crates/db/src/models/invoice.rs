use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "invoice_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum InvoiceStatus {
    #[default]
    Draft,
    Sent,
    Paid,
    Overdue,
    Cancelled,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS, PartialEq)]
pub struct Invoice {
    pub id: Uuid,
    pub invoice_number: String,
    pub customer_id: Uuid,
    pub order_id: Option<Uuid>,
    pub amount: f64,
    pub status: InvoiceStatus,
    pub due_date: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Invoice>(
            r#"SELECT id, invoice_number, customer_id, order_id, amount, status, due_date, paid_at,
                      created_at, updated_at
               FROM invoices
               ORDER BY created_at ASC, id ASC"#,
        )
        .fetch_all(pool)
        .await
    }

    pub async fn insert(&self, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"INSERT INTO invoices (id, invoice_number, customer_id, order_id, amount, status, due_date,
                                     paid_at, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"#,
        )
        .bind(self.id)
        .bind(&self.invoice_number)
        .bind(self.customer_id)
        .bind(self.order_id)
        .bind(self.amount)
        .bind(&self.status)
        .bind(self.due_date)
        .bind(self.paid_at)
        .bind(self.created_at)
        .bind(self.updated_at)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn update(&self, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"UPDATE invoices
               SET invoice_number = $2, customer_id = $3, order_id = $4, amount = $5, status = $6,
                   due_date = $7, paid_at = $8, created_at = $9, updated_at = $10
               WHERE id = $1"#,
        )
        .bind(self.id)
        .bind(&self.invoice_number)
        .bind(self.customer_id)
        .bind(self.order_id)
        .bind(self.amount)
        .bind(&self.status)
        .bind(self.due_date)
        .bind(self.paid_at)
        .bind(self.created_at)
        .bind(self.updated_at)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }
}
