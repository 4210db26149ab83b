//! Conversation Cache
//!
//! Buffers live call transcripts in a local key/value store so a restart does
//! not lose them, and pushes them to the conversation backend on a timer while
//! calls are active and once more when each call ends.

mod service;
mod store;

use async_trait::async_trait;

pub use service::ConversationCache;
pub use store::{InMemoryConversationStore, LocalConversationStore, StoreError};

use crate::domain::conversation::{CachedConversation, CallId};
use crate::errors::ApplicationError;

/// Prefix of every conversation blob in the local store.
pub const STORAGE_KEY_PREFIX: &str = "call_conversation_";

pub fn storage_key(call_id: &CallId) -> String {
    format!("{STORAGE_KEY_PREFIX}{}", call_id.as_str())
}

/// The conversation persistence API. `upsert` overwrites whatever the backend
/// holds for the call.
#[async_trait]
pub trait ConversationSyncBackend: Send + Sync {
    async fn upsert(
        &self,
        call_id: &CallId,
        conversation: &CachedConversation,
    ) -> Result<(), ApplicationError>;
}

/// Downstream work to run once a conversation has ended and been synced.
#[async_trait]
pub trait ConversationCompletionHook: Send + Sync {
    async fn conversation_completed(&self, conversation: &CachedConversation);
}
