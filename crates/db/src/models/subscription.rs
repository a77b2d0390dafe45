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
#[sqlx(type_name = "subscription_frequency", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SubscriptionFrequency {
    #[default]
    Weekly,
    Biweekly,
    Monthly,
}

impl SubscriptionFrequency {
}

#[derive(
    Debug, Clone, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "subscription_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SubscriptionStatus {
    #[default]
    Active,
    Paused,
    Cancelled,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS, PartialEq)]
pub struct Subscription {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub frequency: SubscriptionFrequency,
    pub status: SubscriptionStatus,
    pub next_delivery: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS, PartialEq)]
pub struct SubscriptionItem {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub stem_length: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, PartialEq)]
pub struct SubscriptionWithItems {
    #[serde(flatten)]
    #[ts(flatten)]
    pub subscription: Subscription,
    pub items: Vec<SubscriptionItem>,
}

impl std::ops::Deref for SubscriptionWithItems {
    type Target = Subscription;
    fn deref(&self) -> &Self::Target {
        &self.subscription
    }
}

impl SubscriptionItem {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, SubscriptionItem>(
            r#"SELECT id, subscription_id, product_id, quantity, stem_length
               FROM subscription_items
               ORDER BY subscription_id ASC, id ASC"#,
        )
        .fetch_all(pool)
        .await
    }

    pub async fn insert(&self, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"INSERT INTO subscription_items (id, subscription_id, product_id, quantity, stem_length)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(self.id)
        .bind(self.subscription_id)
        .bind(self.product_id)
        .bind(self.quantity)
        .bind(self.stem_length)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn delete_by_subscription_id(
        conn: &mut SqliteConnection,
        subscription_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM subscription_items WHERE subscription_id = $1")
            .bind(subscription_id)
            .execute(conn)
            .await?;
        Ok(result.rows_affected())
    }
}

impl SubscriptionWithItems {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        let subscriptions = sqlx::query_as::<_, Subscription>(
            r#"SELECT id, customer_id, frequency, status, next_delivery, created_at, updated_at
               FROM subscriptions
               ORDER BY created_at ASC, id ASC"#,
        )
        .fetch_all(pool)
        .await?;

        let mut items_by_subscription: HashMap<Uuid, Vec<SubscriptionItem>> = HashMap::new();
        for item in SubscriptionItem::find_all(pool).await? {
            items_by_subscription
                .entry(item.subscription_id)
                .or_default()
                .push(item);
        }

        Ok(subscriptions
            .into_iter()
            .map(|subscription| SubscriptionWithItems {
                items: items_by_subscription
                    .remove(&subscription.id)
                    .unwrap_or_default(),
                subscription,
            })
            .collect())
    }

    pub async fn insert(&self, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"INSERT INTO subscriptions (id, customer_id, frequency, status, next_delivery, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(self.subscription.id)
        .bind(self.subscription.customer_id)
        .bind(&self.subscription.frequency)
        .bind(&self.subscription.status)
        .bind(self.subscription.next_delivery)
        .bind(self.subscription.created_at)
        .bind(self.subscription.updated_at)
        .execute(&mut *conn)
        .await?;

        for item in &self.items {
            item.insert(&mut *conn).await?;
        }
        Ok(())
    }

    /// Rewrite the subscription row and replace its items wholesale.
    pub async fn update(&self, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"UPDATE subscriptions
               SET customer_id = $2, frequency = $3, status = $4, next_delivery = $5,
                   created_at = $6, updated_at = $7
               WHERE id = $1"#,
        )
        .bind(self.subscription.id)
        .bind(self.subscription.customer_id)
        .bind(&self.subscription.frequency)
        .bind(&self.subscription.status)
        .bind(self.subscription.next_delivery)
        .bind(self.subscription.created_at)
        .bind(self.subscription.updated_at)
        .execute(&mut *conn)
        .await?;

        SubscriptionItem::delete_by_subscription_id(&mut *conn, self.subscription.id).await?;
        for item in &self.items {
            item.insert(&mut *conn).await?;
        }
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::{
        DBService,
        models::{customer::Customer, product::Product},
    };

    #[tokio::test]
    async fn test_update_replaces_items() {
        let db = DBService::new_in_memory().await.unwrap();
        let mut conn = db.pool.acquire().await.unwrap();
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 10, 30, 0).unwrap();

        let customer = Customer {
            id: Uuid::new_v4(),
            name: "Bloom".to_string(),
            email: None,
            phone: None,
            address: None,
            city: None,
            customer_type: Default::default(),
            created_at: now,
            updated_at: now,
        };
        customer.insert(&mut conn).await.unwrap();
        let product = Product {
            id: Uuid::new_v4(),
            sku: "TUL-YLW".to_string(),
            name: "Yellow tulip".to_string(),
            description: None,
            category_id: None,
            price_50cm: 0.4,
            price_60cm: 0.5,
            price_70cm: 0.6,
            stock: 500,
            min_stock: 50,
            active: true,
            created_at: now,
            updated_at: now,
        };
        product.insert(&mut conn).await.unwrap();

        let subscription_id = Uuid::new_v4();
        let item = |quantity, stem_length| SubscriptionItem {
            id: Uuid::new_v4(),
            subscription_id,
            product_id: product.id,
            quantity,
            stem_length,
        };
        let mut subscription = SubscriptionWithItems {
            subscription: Subscription {
                id: subscription_id,
                customer_id: customer.id,
                frequency: SubscriptionFrequency::Weekly,
                status: SubscriptionStatus::Active,
                next_delivery: now,
                created_at: now,
                updated_at: now,
            },
            items: vec![item(20, 50), item(10, 60)],
        };
        subscription.insert(&mut conn).await.unwrap();

        subscription.subscription.frequency = SubscriptionFrequency::Monthly;
        subscription.items = vec![item(40, 70)];
        assert_eq!(subscription.update(&mut conn).await.unwrap(), 1);
        drop(conn);

        let stored = SubscriptionWithItems::find_all(&db.pool).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].frequency, SubscriptionFrequency::Monthly);
        assert_eq!(stored[0].items, subscription.items);
    }
}
