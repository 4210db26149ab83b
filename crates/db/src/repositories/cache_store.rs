use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

use leadline_core::cache::{LocalConversationStore, StoreError};

use crate::DbPool;

/// Local conversation cache in the `conversation_cache` table. Holds at most
/// `quota` entries; writing a new key beyond that fails with
/// [`StoreError::QuotaExceeded`] so the cache can evict.
pub struct SqlLocalConversationStore {
    pool: DbPool,
    quota: usize,
}

impl SqlLocalConversationStore {
    pub fn new(pool: DbPool, quota: usize) -> Self {
        Self { pool, quota }
    }
}

#[async_trait]
impl LocalConversationStore for SqlLocalConversationStore {
    async fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        let row = sqlx::query("SELECT payload FROM conversation_cache WHERE cache_key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.map(|row| row.try_get::<String, _>("payload")).transpose().map_err(backend)
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let exists = sqlx::query("SELECT 1 FROM conversation_cache WHERE cache_key = ?")
            .bind(key)
            .fetch_optional(&mut *tx)
            .await
            .map_err(backend)?
            .is_some();
        if !exists {
            let count = sqlx::query("SELECT COUNT(*) AS count FROM conversation_cache")
                .fetch_one(&mut *tx)
                .await
                .and_then(|row| row.try_get::<i64, _>("count"))
                .map_err(backend)?;
            if usize::try_from(count).unwrap_or(usize::MAX) >= self.quota {
                return Err(StoreError::QuotaExceeded { limit: self.quota });
            }
        }

        sqlx::query(
            "INSERT INTO conversation_cache (cache_key, payload, updated_at)
             VALUES (?, ?, ?)
             ON CONFLICT(cache_key) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        tx.commit().await.map_err(backend)
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM conversation_cache WHERE cache_key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query("SELECT cache_key FROM conversation_cache ORDER BY cache_key ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        rows.into_iter()
            .map(|row| row.try_get::<String, _>("cache_key"))
            .collect::<Result<Vec<_>, _>>()
            .map_err(backend)
    }
}

fn backend(error: sqlx::Error) -> StoreError {
    StoreError::Backend(error.to_string())
}
