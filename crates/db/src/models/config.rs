use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

/// Persisted key/value application setting
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS, PartialEq)]
pub struct Config {
    pub id: Uuid,
    pub key: String,
    pub value: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Config {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Config>(
            r#"SELECT id, key, value, created_at, updated_at
               FROM configs
               ORDER BY key ASC"#,
        )
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_key(pool: &SqlitePool, key: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Config>(
            r#"SELECT id, key, value, created_at, updated_at
               FROM configs
               WHERE key = $1"#,
        )
        .bind(key)
        .fetch_optional(pool)
        .await
    }

    /// All settings whose key starts with `prefix` (e.g. `backup.`).
    pub async fn find_by_prefix(pool: &SqlitePool, prefix: &str) -> Result<Vec<Self>, sqlx::Error> {
        let pattern = format!("{}%", prefix.replace('%', "\\%").replace('_', "\\_"));
        sqlx::query_as::<_, Config>(
            r#"SELECT id, key, value, created_at, updated_at
               FROM configs
               WHERE key LIKE $1 ESCAPE '\'
               ORDER BY key ASC"#,
        )
        .bind(pattern)
        .fetch_all(pool)
        .await
    }

    /// Insert or overwrite the value stored under `key`.
    pub async fn upsert(pool: &SqlitePool, key: &str, value: &str) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        sqlx::query_as::<_, Config>(
            r#"INSERT INTO configs (id, key, value, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $4)
               ON CONFLICT(key) DO UPDATE SET
                   value = excluded.value,
                   updated_at = excluded.updated_at
               RETURNING id, key, value, created_at, updated_at"#,
        )
        .bind(id)
        .bind(key)
        .bind(value)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    pub async fn insert(&self, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"INSERT INTO configs (id, key, value, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(self.id)
        .bind(&self.key)
        .bind(&self.value)
        .bind(self.created_at)
        .bind(self.updated_at)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn update(&self, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"UPDATE configs
               SET key = $2, value = $3, created_at = $4, updated_at = $5
               WHERE id = $1"#,
        )
        .bind(self.id)
        .bind(&self.key)
        .bind(&self.value)
        .bind(self.created_at)
        .bind(self.updated_at)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Overwrite whichever row holds `self.key`, taking over its id as well.
    pub async fn replace_by_key(&self, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"UPDATE configs
               SET id = $1, value = $3, created_at = $4, updated_at = $5
               WHERE key = $2"#,
        )
        .bind(self.id)
        .bind(&self.key)
        .bind(&self.value)
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

    #[tokio::test]
    async fn test_upsert_overwrites_value_and_keeps_id() {
        let db = DBService::new_in_memory().await.unwrap();

        let first = Config::upsert(&db.pool, "backup.retention_days", "30").await.unwrap();
        let second = Config::upsert(&db.pool, "backup.retention_days", "14").await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.value, "14");
    }

    #[tokio::test]
    async fn test_find_by_prefix_filters_other_keys() {
        let db = DBService::new_in_memory().await.unwrap();
        Config::upsert(&db.pool, "backup.enabled", "true").await.unwrap();
        Config::upsert(&db.pool, "backup_enabled", "true").await.unwrap();
        Config::upsert(&db.pool, "shop.name", "Bloemen").await.unwrap();

        let keys: Vec<String> = Config::find_by_prefix(&db.pool, "backup.")
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.key)
            .collect();
        assert_eq!(keys, vec!["backup.enabled".to_string()]);
    }

    #[tokio::test]
    async fn test_replace_by_key_takes_over_id() {
        let db = DBService::new_in_memory().await.unwrap();
        Config::upsert(&db.pool, "shop.name", "Bloemen").await.unwrap();

        let now = Utc::now();
        let restored = Config {
            id: Uuid::new_v4(),
            key: "shop.name".to_string(),
            value: "Bloemen & Co".to_string(),
            created_at: now,
            updated_at: now,
        };
        let mut conn = db.pool.acquire().await.unwrap();
        assert_eq!(restored.replace_by_key(&mut conn).await.unwrap(), 1);
        drop(conn);

        let row = Config::find_by_key(&db.pool, "shop.name").await.unwrap().unwrap();
        assert_eq!(row, restored);
    }
}
