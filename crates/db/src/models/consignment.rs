use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ConsignmentItemError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("consignment item {0} not found")]
    NotFound(Uuid),
    #[error("quantities must not be negative (delivered {delivered}, sold {sold}, returned {returned})")]
    NegativeQuantity {
        delivered: i32,
        sold: i32,
        returned: i32,
    },
    #[error("sold {sold} + returned {returned} exceeds delivered {delivered}")]
    ExceedsDelivered {
        delivered: i32,
        sold: i32,
        returned: i32,
    },
}

#[derive(
    Debug, Clone, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "consignment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConsignmentStatus {
    #[default]
    Open,
    Settled,
    Closed,
}

/// Product left with a store and settled later against sold/returned counts
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS, PartialEq)]
pub struct Consignment {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub status: ConsignmentStatus,
    pub delivered_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS, PartialEq)]
pub struct ConsignmentItem {
    pub id: Uuid,
    pub consignment_id: Uuid,
    pub product_id: Uuid,
    pub delivered: i32,
    pub sold: i32,
    pub returned: i32,
    pub unit_price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, PartialEq)]
pub struct ConsignmentWithItems {
    #[serde(flatten)]
    #[ts(flatten)]
    pub consignment: Consignment,
    pub items: Vec<ConsignmentItem>,
}

impl std::ops::Deref for ConsignmentWithItems {
    type Target = Consignment;
    fn deref(&self) -> &Self::Target {
        &self.consignment
    }
}

impl ConsignmentItem {
    /// `sold + returned` may never exceed `delivered`, and none may be negative.
    pub fn validate_quantities(
        delivered: i32,
        sold: i32,
        returned: i32,
    ) -> Result<(), ConsignmentItemError> {
        if delivered < 0 || sold < 0 || returned < 0 {
            return Err(ConsignmentItemError::NegativeQuantity {
                delivered,
                sold,
                returned,
            });
        }
        // i64 so that two large i32 counts cannot overflow the sum
        if sold as i64 + returned as i64 > delivered as i64 {
            return Err(ConsignmentItemError::ExceedsDelivered {
                delivered,
                sold,
                returned,
            });
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConsignmentItemError> {
        Self::validate_quantities(self.delivered, self.sold, self.returned)
    }

    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, ConsignmentItem>(
            r#"SELECT id, consignment_id, product_id, delivered, sold, returned, unit_price
               FROM consignment_items
               ORDER BY consignment_id ASC, id ASC"#,
        )
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ConsignmentItem>(
            r#"SELECT id, consignment_id, product_id, delivered, sold, returned, unit_price
               FROM consignment_items
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Record how many units the store sold and sent back. Rejects the pair
    /// before touching the row when it would break the delivered bound.
    pub async fn record_settlement(
        pool: &SqlitePool,
        id: Uuid,
        sold: i32,
        returned: i32,
    ) -> Result<Self, ConsignmentItemError> {
        let item = Self::find_by_id(pool, id)
            .await?
            .ok_or(ConsignmentItemError::NotFound(id))?;

        Self::validate_quantities(item.delivered, sold, returned)?;

        let updated = sqlx::query_as::<_, ConsignmentItem>(
            r#"UPDATE consignment_items
               SET sold = $2, returned = $3
               WHERE id = $1
               RETURNING id, consignment_id, product_id, delivered, sold, returned, unit_price"#,
        )
        .bind(id)
        .bind(sold)
        .bind(returned)
        .fetch_one(pool)
        .await?;
        Ok(updated)
    }

    pub async fn insert(&self, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"INSERT INTO consignment_items (id, consignment_id, product_id, delivered, sold, returned, unit_price)
               VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(self.id)
        .bind(self.consignment_id)
        .bind(self.product_id)
        .bind(self.delivered)
        .bind(self.sold)
        .bind(self.returned)
        .bind(self.unit_price)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn delete_by_consignment_id(
        conn: &mut SqliteConnection,
        consignment_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM consignment_items WHERE consignment_id = $1")
            .bind(consignment_id)
            .execute(conn)
            .await?;
        Ok(result.rows_affected())
    }
}

impl ConsignmentWithItems {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        let consignments = sqlx::query_as::<_, Consignment>(
            r#"SELECT id, customer_id, status, delivered_at, settled_at, created_at, updated_at
               FROM consignments
               ORDER BY created_at ASC, id ASC"#,
        )
        .fetch_all(pool)
        .await?;

        let mut items_by_consignment: HashMap<Uuid, Vec<ConsignmentItem>> = HashMap::new();
        for item in ConsignmentItem::find_all(pool).await? {
            items_by_consignment
                .entry(item.consignment_id)
                .or_default()
                .push(item);
        }

        Ok(consignments
            .into_iter()
            .map(|consignment| ConsignmentWithItems {
                items: items_by_consignment
                    .remove(&consignment.id)
                    .unwrap_or_default(),
                consignment,
            })
            .collect())
    }

    pub async fn insert(&self, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"INSERT INTO consignments (id, customer_id, status, delivered_at, settled_at, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(self.consignment.id)
        .bind(self.consignment.customer_id)
        .bind(&self.consignment.status)
        .bind(self.consignment.delivered_at)
        .bind(self.consignment.settled_at)
        .bind(self.consignment.created_at)
        .bind(self.consignment.updated_at)
        .execute(&mut *conn)
        .await?;

        for item in &self.items {
            item.insert(&mut *conn).await?;
        }
        Ok(())
    }

    /// Rewrite the consignment row and replace its items wholesale.
    pub async fn update(&self, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"UPDATE consignments
               SET customer_id = $2, status = $3, delivered_at = $4, settled_at = $5,
                   created_at = $6, updated_at = $7
               WHERE id = $1"#,
        )
        .bind(self.consignment.id)
        .bind(self.consignment.customer_id)
        .bind(&self.consignment.status)
        .bind(self.consignment.delivered_at)
        .bind(self.consignment.settled_at)
        .bind(self.consignment.created_at)
        .bind(self.consignment.updated_at)
        .execute(&mut *conn)
        .await?;

        ConsignmentItem::delete_by_consignment_id(&mut *conn, self.consignment.id).await?;
        for item in &self.items {
            item.insert(&mut *conn).await?;
        }
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        DBService,
        models::{
            customer::{Customer, CustomerType},
            product::Product,
        },
    };

    #[test]
    fn test_validate_quantities_bounds() {
        assert!(ConsignmentItem::validate_quantities(10, 6, 4).is_ok());
        assert!(matches!(
            ConsignmentItem::validate_quantities(10, 7, 4),
            Err(ConsignmentItemError::ExceedsDelivered { .. })
        ));
        assert!(matches!(
            ConsignmentItem::validate_quantities(10, -1, 0),
            Err(ConsignmentItemError::NegativeQuantity { .. })
        ));
        assert!(ConsignmentItem::validate_quantities(i32::MAX, i32::MAX, i32::MAX).is_err());
    }

    async fn seed(db: &DBService) -> ConsignmentItem {
        let now = Utc::now();
        let customer = Customer {
            id: Uuid::new_v4(),
            name: "Corner Shop".to_string(),
            email: None,
            phone: None,
            address: None,
            city: Some("Aalsmeer".to_string()),
            customer_type: CustomerType::Store,
            created_at: now,
            updated_at: now,
        };
        let product = Product {
            id: Uuid::new_v4(),
            sku: "TULIP-Y".to_string(),
            name: "Yellow tulip".to_string(),
            description: None,
            category_id: None,
            price_50cm: 0.5,
            price_60cm: 0.6,
            price_70cm: 0.7,
            stock: 100,
            min_stock: 10,
            active: true,
            created_at: now,
            updated_at: now,
        };
        let item = ConsignmentItem {
            id: Uuid::new_v4(),
            consignment_id: Uuid::new_v4(),
            product_id: product.id,
            delivered: 20,
            sold: 0,
            returned: 0,
            unit_price: 0.5,
        };
        let consignment = ConsignmentWithItems {
            consignment: Consignment {
                id: item.consignment_id,
                customer_id: customer.id,
                status: ConsignmentStatus::Open,
                delivered_at: now,
                settled_at: None,
                created_at: now,
                updated_at: now,
            },
            items: vec![item.clone()],
        };

        let mut conn = db.pool.acquire().await.unwrap();
        customer.insert(&mut conn).await.unwrap();
        product.insert(&mut conn).await.unwrap();
        consignment.insert(&mut conn).await.unwrap();
        item
    }

    #[tokio::test]
    async fn test_record_settlement_rejects_oversell() {
        let db = DBService::new_in_memory().await.unwrap();
        let item = seed(&db).await;

        let err = ConsignmentItem::record_settlement(&db.pool, item.id, 15, 6)
            .await
            .unwrap_err();
        assert!(matches!(err, ConsignmentItemError::ExceedsDelivered { .. }));

        let unchanged = ConsignmentItem::find_by_id(&db.pool, item.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!((unchanged.sold, unchanged.returned), (0, 0));

        let settled = ConsignmentItem::record_settlement(&db.pool, item.id, 15, 5)
            .await
            .unwrap();
        assert_eq!((settled.sold, settled.returned), (15, 5));
    }

    #[tokio::test]
    async fn test_record_settlement_unknown_item() {
        let db = DBService::new_in_memory().await.unwrap();
        let err = ConsignmentItem::record_settlement(&db.pool, Uuid::new_v4(), 1, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, ConsignmentItemError::NotFound(_)));
    }
}
