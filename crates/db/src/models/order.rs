use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Delivered,
    Cancelled,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS, PartialEq)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub status: OrderStatus,
    pub total: f64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS, PartialEq)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub stem_length: i32,
    pub unit_price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, PartialEq)]
pub struct OrderWithItems {
    #[serde(flatten)]
    #[ts(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

impl std::ops::Deref for OrderWithItems {
    type Target = Order;
    fn deref(&self) -> &Self::Target {
        &self.order
    }
}

impl OrderItem {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, OrderItem>(
            r#"SELECT id, order_id, product_id, quantity, stem_length, unit_price
               FROM order_items
               ORDER BY order_id ASC, id ASC"#,
        )
        .fetch_all(pool)
        .await
    }

    pub async fn insert(&self, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"INSERT INTO order_items (id, order_id, product_id, quantity, stem_length, unit_price)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(self.id)
        .bind(self.order_id)
        .bind(self.product_id)
        .bind(self.quantity)
        .bind(self.stem_length)
        .bind(self.unit_price)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn delete_by_order_id(
        conn: &mut SqliteConnection,
        order_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM order_items WHERE order_id = $1")
            .bind(order_id)
            .execute(conn)
            .await?;
        Ok(result.rows_affected())
    }
}

impl OrderWithItems {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        let orders = sqlx::query_as::<_, Order>(
            r#"SELECT id, order_number, customer_id, status, total, notes, created_at, updated_at
               FROM orders
               ORDER BY created_at ASC, id ASC"#,
        )
        .fetch_all(pool)
        .await?;

        let mut items_by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for item in OrderItem::find_all(pool).await? {
            items_by_order.entry(item.order_id).or_default().push(item);
        }

        Ok(orders
            .into_iter()
            .map(|order| OrderWithItems {
                items: items_by_order.remove(&order.id).unwrap_or_default(),
                order,
            })
            .collect())
    }

    pub async fn insert(&self, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"INSERT INTO orders (id, order_number, customer_id, status, total, notes, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#,
        )
        .bind(self.order.id)
        .bind(&self.order.order_number)
        .bind(self.order.customer_id)
        .bind(&self.order.status)
        .bind(self.order.total)
        .bind(&self.order.notes)
        .bind(self.order.created_at)
        .bind(self.order.updated_at)
        .execute(&mut *conn)
        .await?;

        for item in &self.items {
            item.insert(&mut *conn).await?;
        }
        Ok(())
    }

    /// Rewrite the order row and replace its items wholesale.
    pub async fn update(&self, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"UPDATE orders
               SET order_number = $2, customer_id = $3, status = $4, total = $5, notes = $6,
                   created_at = $7, updated_at = $8
               WHERE id = $1"#,
        )
        .bind(self.order.id)
        .bind(&self.order.order_number)
        .bind(self.order.customer_id)
        .bind(&self.order.status)
        .bind(self.order.total)
        .bind(&self.order.notes)
        .bind(self.order.created_at)
        .bind(self.order.updated_at)
        .execute(&mut *conn)
        .await?;

        OrderItem::delete_by_order_id(&mut *conn, self.order.id).await?;
        for item in &self.items {
            item.insert(&mut *conn).await?;
        }
        Ok(result.rows_affected())
    }
}
