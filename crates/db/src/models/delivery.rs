use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "delivery_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeliveryStatus {
    #[default]
    Scheduled,
    InTransit,
    Delivered,
    Failed,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS, PartialEq)]
pub struct Delivery {
    pub id: Uuid,
    pub order_id: Uuid,
    pub driver_id: Option<Uuid>, // Foreign key to the driver's User
    pub status: DeliveryStatus,
    pub scheduled_for: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub address: String,
    pub route_position: Option<i32>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Delivery {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Delivery>(
            r#"SELECT id, order_id, driver_id, status, scheduled_for, delivered_at, address,
                      route_position, notes, created_at, updated_at
               FROM deliveries
               ORDER BY created_at ASC, id ASC"#,
        )
        .fetch_all(pool)
        .await
    }

    pub async fn insert(&self, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"INSERT INTO deliveries (id, order_id, driver_id, status, scheduled_for, delivered_at, address,
                                       route_position, notes, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"#,
        )
        .bind(self.id)
        .bind(self.order_id)
        .bind(self.driver_id)
        .bind(&self.status)
        .bind(self.scheduled_for)
        .bind(self.delivered_at)
        .bind(&self.address)
        .bind(self.route_position)
        .bind(&self.notes)
        .bind(self.created_at)
        .bind(self.updated_at)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn update(&self, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"UPDATE deliveries
               SET order_id = $2, driver_id = $3, status = $4, scheduled_for = $5, delivered_at = $6,
                   address = $7, route_position = $8, notes = $9, created_at = $10, updated_at = $11
               WHERE id = $1"#,
        )
        .bind(self.id)
        .bind(self.order_id)
        .bind(self.driver_id)
        .bind(&self.status)
        .bind(self.scheduled_for)
        .bind(self.delivered_at)
        .bind(&self.address)
        .bind(self.route_position)
        .bind(&self.notes)
        .bind(self.created_at)
        .bind(self.updated_at)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }
}
