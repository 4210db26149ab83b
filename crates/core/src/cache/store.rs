use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("local storage quota of {limit} entries exceeded")]
    QuotaExceeded { limit: usize },
    #[error("local storage failure: {0}")]
    Backend(String),
}

/// Durable key/value storage for serialized conversations.
#[async_trait]
pub trait LocalConversationStore: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn write(&self, key: &str, value: &str) -> Result<(), StoreError>;
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
    async fn keys(&self) -> Result<Vec<String>, StoreError>;
}

#[derive(Default)]
pub struct InMemoryConversationStore {
    entries: RwLock<BTreeMap<String, String>>,
    quota: Option<usize>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects writes of new keys once `quota` entries are stored.
    pub fn with_quota(quota: usize) -> Self {
        Self { entries: RwLock::default(), quota: Some(quota) }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl LocalConversationStore for InMemoryConversationStore {
    async fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        if let Some(limit) = self.quota {
            if !entries.contains_key(key) && entries.len() >= limit {
                return Err(StoreError::QuotaExceeded { limit });
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::{InMemoryConversationStore, LocalConversationStore, StoreError};

    #[tokio::test]
    async fn quota_rejects_new_keys_but_allows_overwrites() {
        let store = InMemoryConversationStore::with_quota(1);
        store.write("a", "1").await.expect("first write");
        store.write("a", "2").await.expect("overwrite");
        assert_eq!(store.write("b", "1").await, Err(StoreError::QuotaExceeded { limit: 1 }));

        store.remove("a").await.expect("remove");
        store.write("b", "1").await.expect("write after remove");
        assert_eq!(store.keys().await.expect("keys"), vec!["b".to_string()]);
        assert_eq!(store.read("b").await.expect("read").as_deref(), Some("1"));
    }
}
