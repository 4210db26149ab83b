use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

use leadline_core::cache::ConversationSyncBackend;
use leadline_core::domain::conversation::{CachedConversation, CallId};
use leadline_core::errors::ApplicationError;

use super::{parse_json, to_json, RepositoryError};
use crate::DbPool;

/// Durable conversation records, the sync target of the conversation cache.
pub struct SqlConversationRecordRepository {
    pool: DbPool,
}

impl SqlConversationRecordRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, call_id: &CallId) -> Result<Option<CachedConversation>, RepositoryError> {
        let row = sqlx::query("SELECT payload_json FROM conversation_record WHERE call_id = ?")
            .bind(call_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            let payload = row.try_get::<String, _>("payload_json")?;
            parse_json("payload_json", &payload)
        })
        .transpose()
    }

    pub async fn save(&self, conversation: &CachedConversation) -> Result<(), RepositoryError> {
        let metadata = &conversation.metadata;
        sqlx::query(
            "INSERT INTO conversation_record (
                call_id,
                owner_id,
                status,
                started_at,
                ended_at,
                payload_json,
                synced_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(call_id) DO UPDATE SET
                owner_id = excluded.owner_id,
                status = excluded.status,
                started_at = excluded.started_at,
                ended_at = excluded.ended_at,
                payload_json = excluded.payload_json,
                synced_at = excluded.synced_at",
        )
        .bind(metadata.call_id.as_str())
        .bind(metadata.owner_id.as_deref())
        .bind(metadata.status.as_str())
        .bind(metadata.started_at.to_rfc3339())
        .bind(metadata.ended_at.map(|value| value.to_rfc3339()))
        .bind(to_json("payload_json", conversation)?)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ConversationSyncBackend for SqlConversationRecordRepository {
    async fn upsert(
        &self,
        call_id: &CallId,
        conversation: &CachedConversation,
    ) -> Result<(), ApplicationError> {
        if conversation.call_id() != call_id {
            return Err(ApplicationError::Persistence(format!(
                "conversation {} cannot be stored under call {call_id}",
                conversation.call_id()
            )));
        }
        Ok(self.save(conversation).await?)
    }
}
