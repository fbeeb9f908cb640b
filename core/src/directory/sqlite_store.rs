// ABOUTME: SQLite-backed preference store so the chosen signer survives process restarts
// ABOUTME: One key_value table keyed by (namespace, key), writes are upserts

use super::{KeyValueStore, StoreError};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `url`, e.g. `sqlite://prefs.db` or `sqlite::memory:`
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        // A single connection keeps in-memory databases shared and writes serialized
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Self::with_pool(pool).await
    }

    pub async fn with_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS key_value (
                namespace TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (namespace, key)
            )
            "#,
        )
        .execute(&pool)
        .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, StoreError> {
        let value = sqlx::query_scalar::<_, String>(
            "SELECT value FROM key_value WHERE namespace = ?1 AND key = ?2",
        )
        .bind(namespace)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(value)
    }

    async fn set(&self, namespace: &str, key: &str, value: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO key_value (namespace, key, value, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(namespace, key) DO UPDATE
            SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(namespace)
        .bind(key)
        .bind(value)
        .bind(chrono::Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_overwrites() {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        assert_eq!(store.get("prefs", "signer").await.unwrap(), None);

        store.set("prefs", "signer", "com.first").await.unwrap();
        store.set("prefs", "signer", "com.second").await.unwrap();
        store.set("other", "signer", "com.other").await.unwrap();

        assert_eq!(store.get("prefs", "signer").await.unwrap().as_deref(), Some("com.second"));
        assert_eq!(store.get("other", "signer").await.unwrap().as_deref(), Some("com.other"));

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM key_value")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(rows, 2);
    }

    #[tokio::test]
    async fn test_value_survives_reopen() {
        let path = std::env::temp_dir().join(format!("nip55-prefs-{}.db", uuid::Uuid::new_v4()));
        let url = format!("sqlite://{}", path.display());

        {
            let store = SqliteStore::connect(&url).await.unwrap();
            store.set("prefs", "signer", "com.example.signer").await.unwrap();
            store.pool().close().await;
        }

        let reopened = SqliteStore::connect(&url).await.unwrap();
        assert_eq!(
            reopened.get("prefs", "signer").await.unwrap().as_deref(),
            Some("com.example.signer")
        );
        reopened.pool().close().await;
        std::fs::remove_file(&path).ok();
    }
}
