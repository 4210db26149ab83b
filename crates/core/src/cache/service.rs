use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::store::{LocalConversationStore, StoreError};
use super::{
    storage_key, ConversationCompletionHook, ConversationSyncBackend, STORAGE_KEY_PREFIX,
};
use crate::config::CacheConfig;
use crate::domain::conversation::{
    CachedConversation, CallId, CallMetadata, CallMetadataPatch, ConversationTurn, SyncStatus,
};
use crate::extraction::BusinessDataExtractor;

#[derive(Default)]
struct CacheState {
    conversations: HashMap<CallId, CachedConversation>,
    active: BTreeSet<CallId>,
    sync_task: Option<JoinHandle<()>>,
}

/// Local-first conversation buffer with background synchronization.
///
/// Every operation is best effort: storage and backend failures are logged and
/// the in-memory copy stays authoritative until a later sync succeeds. Clones
/// share the same state.
#[derive(Clone)]
pub struct ConversationCache {
    store: Arc<dyn LocalConversationStore>,
    backend: Arc<dyn ConversationSyncBackend>,
    hook: Option<Arc<dyn ConversationCompletionHook>>,
    extractor: BusinessDataExtractor,
    config: CacheConfig,
    state: Arc<Mutex<CacheState>>,
}

impl ConversationCache {
    pub fn new(
        store: Arc<dyn LocalConversationStore>,
        backend: Arc<dyn ConversationSyncBackend>,
        config: CacheConfig,
    ) -> Self {
        Self {
            store,
            backend,
            hook: None,
            extractor: BusinessDataExtractor::new(),
            config,
            state: Arc::default(),
        }
    }

    pub fn with_completion_hook(mut self, hook: Arc<dyn ConversationCompletionHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub async fn start_conversation(&self, metadata: CallMetadata) -> CachedConversation {
        let call_id = metadata.call_id.clone();
        let conversation = CachedConversation::new(metadata);

        let mut state = self.state.lock().await;
        if state.conversations.contains_key(&call_id) {
            warn!(
                event_name = "cache.conversation.restarted",
                call_id = %call_id,
                "conversation already cached; replacing it"
            );
        }
        state.conversations.insert(call_id.clone(), conversation.clone());
        state.active.insert(call_id.clone());
        self.persist(&mut state, &call_id).await;
        self.arm_sync_task(&mut state);

        info!(event_name = "cache.conversation.started", call_id = %call_id, "conversation started");
        conversation
    }

    /// Appends a turn. Customer turns also feed the extraction rules. Returns
    /// false when the call is not cached.
    pub async fn add_conversation_turn(&self, call_id: &CallId, turn: ConversationTurn) -> bool {
        let mut state = self.state.lock().await;
        let Some(conversation) = state.conversations.get_mut(call_id) else {
            warn!(
                event_name = "cache.turn.unknown_call",
                call_id = %call_id,
                "turn for a conversation that is not cached"
            );
            return false;
        };

        if turn.is_customer() {
            let extracted = self.extractor.extract(&turn.content);
            if !extracted.is_empty() {
                conversation.extracted_data.merge_from(&extracted);
                conversation.metadata.absorb_extracted(&conversation.extracted_data);
            }
        }
        conversation.push_turn(turn);
        self.persist(&mut state, call_id).await;
        true
    }

    pub async fn update_call_metadata(&self, call_id: &CallId, patch: CallMetadataPatch) -> bool {
        let mut state = self.state.lock().await;
        let Some(conversation) = state.conversations.get_mut(call_id) else {
            warn!(
                event_name = "cache.metadata.unknown_call",
                call_id = %call_id,
                "metadata update for a conversation that is not cached"
            );
            return false;
        };

        conversation.metadata.apply_patch(patch);
        conversation.touch();
        self.persist(&mut state, call_id).await;
        true
    }

    /// Finalizes the call, syncs it and hands it to the completion hook.
    pub async fn end_conversation(
        &self,
        call_id: &CallId,
        final_patch: Option<CallMetadataPatch>,
    ) -> Option<CachedConversation> {
        {
            let mut state = self.state.lock().await;
            let Some(conversation) = state.conversations.get_mut(call_id) else {
                warn!(
                    event_name = "cache.end.unknown_call",
                    call_id = %call_id,
                    "end requested for a conversation that is not cached"
                );
                return None;
            };

            if let Some(patch) = final_patch {
                conversation.metadata.apply_patch(patch);
            }
            if let Err(error) = conversation.finalize(Utc::now()) {
                warn!(
                    event_name = "cache.end.not_active",
                    call_id = %call_id,
                    error = %error,
                    "conversation already ended"
                );
                let conversation = conversation.clone();
                state.active.remove(call_id);
                return Some(conversation);
            }
            state.active.remove(call_id);
            self.persist(&mut state, call_id).await;
        }

        self.sync_conversation(call_id).await;
        let conversation = self.get_conversation(call_id).await?;
        info!(
            event_name = "cache.conversation.ended",
            call_id = %call_id,
            duration_secs = conversation.metadata.duration_secs.unwrap_or_default(),
            turns = conversation.turns().len(),
            "conversation ended"
        );

        if let Some(hook) = &self.hook {
            hook.conversation_completed(&conversation).await;
        }
        Some(conversation)
    }

    /// Pushes one conversation to the backend. Returns whether it is synced.
    pub async fn sync_conversation(&self, call_id: &CallId) -> bool {
        let snapshot = {
            let mut state = self.state.lock().await;
            let Some(conversation) = state.conversations.get_mut(call_id) else {
                return false;
            };
            match conversation.sync_status {
                SyncStatus::Synced => return true,
                SyncStatus::Failed => {
                    conversation.sync_status = SyncStatus::Pending;
                    let snapshot = conversation.clone();
                    self.persist(&mut state, call_id).await;
                    snapshot
                }
                SyncStatus::Pending => conversation.clone(),
            }
        };

        let result = self.backend.upsert(call_id, &snapshot).await;

        let mut state = self.state.lock().await;
        let Some(conversation) = state.conversations.get_mut(call_id) else {
            return result.is_ok();
        };
        if conversation.last_updated != snapshot.last_updated {
            debug!(
                event_name = "cache.sync.superseded",
                call_id = %call_id,
                "conversation changed while syncing; leaving it pending"
            );
            return false;
        }

        let synced = match result {
            Ok(()) => {
                conversation.sync_status = SyncStatus::Synced;
                debug!(event_name = "cache.sync.succeeded", call_id = %call_id, "conversation synced");
                true
            }
            Err(error) => {
                conversation.sync_status = SyncStatus::Failed;
                warn!(
                    event_name = "cache.sync.failed",
                    call_id = %call_id,
                    error = %error,
                    "conversation sync failed; will retry"
                );
                false
            }
        };
        self.persist(&mut state, call_id).await;
        synced
    }

    /// Syncs every conversation not yet synced. Returns how many succeeded.
    pub async fn sync_all_pending(&self) -> usize {
        let pending = {
            let state = self.state.lock().await;
            state
                .conversations
                .values()
                .filter(|conversation| conversation.sync_status != SyncStatus::Synced)
                .map(|conversation| conversation.call_id().clone())
                .collect::<Vec<_>>()
        };

        let mut synced = 0;
        for call_id in &pending {
            if self.sync_conversation(call_id).await {
                synced += 1;
            }
        }
        if !pending.is_empty() {
            debug!(
                event_name = "cache.sync.batch",
                pending = pending.len(),
                synced,
                "pending conversations synced"
            );
        }
        synced
    }

    pub async fn get_conversation(&self, call_id: &CallId) -> Option<CachedConversation> {
        self.state.lock().await.conversations.get(call_id).cloned()
    }

    pub async fn active_call_ids(&self) -> Vec<CallId> {
        self.state.lock().await.active.iter().cloned().collect()
    }

    /// Reloads conversations left in the local store by a previous process.
    /// Conversations already in memory win over their stored copy.
    pub async fn restore(&self) -> usize {
        let keys = match self.store.keys().await {
            Ok(keys) => keys,
            Err(error) => {
                warn!(event_name = "cache.restore.failed", error = %error, "listing local store failed");
                return 0;
            }
        };

        let mut state = self.state.lock().await;
        let mut restored = 0;
        for key in keys.iter().filter(|key| key.starts_with(STORAGE_KEY_PREFIX)) {
            let raw = match self.store.read(key).await {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(error) => {
                    warn!(event_name = "cache.restore.read_failed", key = %key, error = %error, "reading cached conversation failed");
                    continue;
                }
            };
            let conversation = match serde_json::from_str::<CachedConversation>(&raw) {
                Ok(conversation) => conversation,
                Err(error) => {
                    warn!(event_name = "cache.restore.corrupt", key = %key, error = %error, "skipping unreadable cached conversation");
                    continue;
                }
            };

            let call_id = conversation.call_id().clone();
            if state.conversations.contains_key(&call_id) {
                continue;
            }
            if conversation.is_active() {
                state.active.insert(call_id.clone());
            }
            state.conversations.insert(call_id, conversation);
            restored += 1;
        }

        if !state.active.is_empty() {
            self.arm_sync_task(&mut state);
        }
        info!(
            event_name = "cache.restore.completed",
            restored,
            active = state.active.len(),
            "cached conversations restored"
        );
        restored
    }

    /// Drops ended, synced conversations from memory and the local store.
    pub async fn cleanup_synced(&self) -> usize {
        let mut state = self.state.lock().await;
        let finished = state
            .conversations
            .values()
            .filter(|conversation| {
                conversation.sync_status == SyncStatus::Synced && !conversation.is_active()
            })
            .map(|conversation| conversation.call_id().clone())
            .collect::<Vec<_>>();

        for call_id in &finished {
            if let Err(error) = self.store.remove(&storage_key(call_id)).await {
                warn!(
                    event_name = "cache.cleanup.remove_failed",
                    call_id = %call_id,
                    error = %error,
                    "removing synced conversation from local store failed"
                );
            }
            state.conversations.remove(call_id);
        }
        finished.len()
    }

    /// Stops the periodic sync task if one is running.
    pub async fn shutdown(&self) {
        if let Some(task) = self.state.lock().await.sync_task.take() {
            task.abort();
        }
    }

    pub async fn sync_task_running(&self) -> bool {
        self.state.lock().await.sync_task.as_ref().is_some_and(|task| !task.is_finished())
    }

    async fn persist(&self, state: &mut CacheState, call_id: &CallId) {
        let Some(conversation) = state.conversations.get(call_id) else {
            return;
        };
        let payload = match serde_json::to_string(conversation) {
            Ok(payload) => payload,
            Err(error) => {
                warn!(event_name = "cache.persist.encode_failed", call_id = %call_id, error = %error, "encoding conversation failed");
                return;
            }
        };
        let key = storage_key(call_id);

        match self.store.write(&key, &payload).await {
            Ok(()) => {}
            Err(StoreError::QuotaExceeded { limit }) => {
                warn!(
                    event_name = "cache.persist.quota_exceeded",
                    call_id = %call_id,
                    limit,
                    "local store full; evicting old conversations"
                );
                self.evict(state, &key).await;
                if let Err(error) = self.store.write(&key, &payload).await {
                    warn!(
                        event_name = "cache.persist.failed",
                        call_id = %call_id,
                        error = %error,
                        "local write failed after eviction; keeping conversation in memory"
                    );
                }
            }
            Err(error) => warn!(
                event_name = "cache.persist.failed",
                call_id = %call_id,
                error = %error,
                "local write failed; keeping conversation in memory"
            ),
        }
    }

    /// Keeps only synced or active conversations in the local store, newest
    /// first, up to `max_cached_conversations`. Unsynced conversations stay in
    /// memory so they can still reach the backend.
    async fn evict(&self, state: &mut CacheState, writing_key: &str) {
        let mut candidates = state
            .conversations
            .values()
            .filter(|conversation| {
                conversation.sync_status == SyncStatus::Synced || conversation.is_active()
            })
            .collect::<Vec<_>>();
        candidates.sort_by(|left, right| right.last_updated.cmp(&left.last_updated));

        let retained = candidates
            .iter()
            .take(self.config.max_cached_conversations)
            .map(|conversation| storage_key(conversation.call_id()))
            .chain(std::iter::once(writing_key.to_string()))
            .collect::<HashSet<_>>();

        let keys = match self.store.keys().await {
            Ok(keys) => keys,
            Err(error) => {
                warn!(event_name = "cache.evict.failed", error = %error, "listing local store failed");
                return;
            }
        };

        let mut evicted = 0;
        for key in keys
            .iter()
            .filter(|key| key.starts_with(STORAGE_KEY_PREFIX) && !retained.contains(*key))
        {
            match self.store.remove(key).await {
                Ok(()) => evicted += 1,
                Err(error) => {
                    warn!(event_name = "cache.evict.remove_failed", key = %key, error = %error, "evicting entry failed");
                }
            }
        }

        state.conversations.retain(|call_id, conversation| {
            conversation.sync_status != SyncStatus::Synced
                || conversation.is_active()
                || retained.contains(&storage_key(call_id))
        });
        info!(event_name = "cache.evict.completed", evicted, retained = retained.len(), "local store evicted");
    }

    /// Starts the periodic sync unless it is already running. The task exits
    /// on the first tick that finds no active call.
    fn arm_sync_task(&self, state: &mut CacheState) {
        if state.sync_task.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }

        let cache = self.clone();
        let period = Duration::from_secs(self.config.sync_interval_secs.max(1));
        state.sync_task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                cache.sync_all_pending().await;

                let mut state = cache.state.lock().await;
                if state.active.is_empty() {
                    state.sync_task = None;
                    debug!(event_name = "cache.sync_task.stopped", "no active calls; periodic sync stopped");
                    break;
                }
            }
        }));
        debug!(
            event_name = "cache.sync_task.started",
            interval_secs = period.as_secs(),
            "periodic sync started"
        );
    }
}
