use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS, PartialEq)]
pub struct Product {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub price_50cm: f64,
    pub price_60cm: f64,
    pub price_70cm: f64,
    pub stock: i32,
    pub min_stock: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Product>(
            r#"SELECT id, sku, name, description, category_id, price_50cm, price_60cm, price_70cm,
                      stock, min_stock, active, created_at, updated_at
               FROM products
               ORDER BY created_at ASC, id ASC"#,
        )
        .fetch_all(pool)
        .await
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM products")
            .fetch_one(pool)
            .await
    }

    pub async fn insert(&self, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"INSERT INTO products (id, sku, name, description, category_id, price_50cm, price_60cm,
                                     price_70cm, stock, min_stock, active, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"#,
        )
        .bind(self.id)
        .bind(&self.sku)
        .bind(&self.name)
        .bind(&self.description)
        .bind(self.category_id)
        .bind(self.price_50cm)
        .bind(self.price_60cm)
        .bind(self.price_70cm)
        .bind(self.stock)
        .bind(self.min_stock)
        .bind(self.active)
        .bind(self.created_at)
        .bind(self.updated_at)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn update(&self, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"UPDATE products
               SET sku = $2, name = $3, description = $4, category_id = $5, price_50cm = $6,
                   price_60cm = $7, price_70cm = $8, stock = $9, min_stock = $10, active = $11,
                   created_at = $12, updated_at = $13
               WHERE id = $1"#,
        )
        .bind(self.id)
        .bind(&self.sku)
        .bind(&self.name)
        .bind(&self.description)
        .bind(self.category_id)
        .bind(self.price_50cm)
        .bind(self.price_60cm)
        .bind(self.price_70cm)
        .bind(self.stock)
        .bind(self.min_stock)
        .bind(self.active)
        .bind(self.created_at)
        .bind(self.updated_at)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DBService;

    fn rose() -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4(),
            sku: "ROSE-RED".to_string(),
            name: "Red rose".to_string(),
            description: None,
            category_id: None,
            price_50cm: 0.8,
            price_60cm: 1.1,
            price_70cm: 1.4,
            stock: 12,
            min_stock: 20,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_update_rewrites_every_column() {
        let db = DBService::new_in_memory().await.unwrap();
        let mut conn = db.pool.acquire().await.unwrap();
        let mut product = rose();
        product.insert(&mut conn).await.unwrap();

        product.description = Some("Kenyan, 60cm".to_string());
        product.stock = 0;
        product.active = false;
        assert_eq!(product.update(&mut conn).await.unwrap(), 1);
        drop(conn);

        assert_eq!(Product::find_all(&db.pool).await.unwrap(), vec![product]);
        assert_eq!(Product::count(&db.pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_of_unknown_id_affects_nothing() {
        let db = DBService::new_in_memory().await.unwrap();
        let mut conn = db.pool.acquire().await.unwrap();
        let product = rose();
        product.insert(&mut conn).await.unwrap();

        let missing = Product {
            id: Uuid::new_v4(),
            ..rose()
        };
        assert_eq!(missing.update(&mut conn).await.unwrap(), 0);
    }
}
