use std::collections::HashMap;

use tokio::sync::RwLock;

use leadline_core::cache::ConversationSyncBackend;
use leadline_core::domain::conversation::{CachedConversation, CallId};
use leadline_core::domain::order::{Order, OrderId};
use leadline_core::domain::trigger::TriggerPoint;
use leadline_core::domain::vendor::VendorProfile;
use leadline_core::errors::ApplicationError;
use leadline_core::ports::{OrderStore, TriggerPointSource, VendorDirectory};

#[derive(Default)]
pub struct InMemoryVendorDirectory {
    vendors: RwLock<Vec<VendorProfile>>,
}

impl InMemoryVendorDirectory {
    pub fn with_vendors(vendors: Vec<VendorProfile>) -> Self {
        Self { vendors: RwLock::new(vendors) }
    }

    /// Inserts or replaces the vendor with the same id.
    pub async fn save(&self, vendor: VendorProfile) {
        let mut vendors = self.vendors.write().await;
        match vendors.iter_mut().find(|existing| existing.id == vendor.id) {
            Some(existing) => *existing = vendor,
            None => vendors.push(vendor),
        }
    }
}

#[async_trait::async_trait]
impl VendorDirectory for InMemoryVendorDirectory {
    async fn vendor_pool(&self, owner_id: &str) -> Result<Vec<VendorProfile>, ApplicationError> {
        let vendors = self.vendors.read().await;
        let mut pool = vendors
            .iter()
            .filter(|vendor| vendor.owner_id == owner_id)
            .cloned()
            .collect::<Vec<_>>();
        pool.sort_by(|left, right| left.id.0.cmp(&right.id.0));
        Ok(pool)
    }
}

#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<String, Order>>,
}

impl InMemoryOrderStore {
    pub async fn find_by_id(&self, id: &OrderId) -> Option<Order> {
        self.orders.read().await.get(&id.0).cloned()
    }

    pub async fn list_for_call(&self, call_id: &CallId) -> Vec<Order> {
        let orders = self.orders.read().await;
        let mut matching = orders
            .values()
            .filter(|order| order.call_id.as_ref() == Some(call_id))
            .cloned()
            .collect::<Vec<_>>();
        matching.sort_by_key(|order| order.created_at);
        matching
    }
}

#[async_trait::async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create(&self, order: &Order) -> Result<(), ApplicationError> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.order_id.0) {
            return Err(ApplicationError::Persistence(format!(
                "order {} already exists",
                order.order_id.0
            )));
        }
        orders.insert(order.order_id.0.clone(), order.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryTriggerPointSource {
    triggers: RwLock<Vec<TriggerPoint>>,
}

impl InMemoryTriggerPointSource {
    pub fn with_triggers(triggers: Vec<TriggerPoint>) -> Self {
        Self { triggers: RwLock::new(triggers) }
    }

    /// Appends a trigger point after the ones already configured.
    pub async fn push(&self, trigger: TriggerPoint) {
        self.triggers.write().await.push(trigger);
    }
}

#[async_trait::async_trait]
impl TriggerPointSource for InMemoryTriggerPointSource {
    async fn trigger_points(&self, owner_id: &str) -> Result<Vec<TriggerPoint>, ApplicationError> {
        let triggers = self.triggers.read().await;
        Ok(triggers.iter().filter(|trigger| trigger.owner_id == owner_id).cloned().collect())
    }
}

#[derive(Default)]
pub struct InMemoryConversationBackend {
    records: RwLock<HashMap<String, CachedConversation>>,
}

impl InMemoryConversationBackend {
    pub async fn find(&self, call_id: &CallId) -> Option<CachedConversation> {
        self.records.read().await.get(call_id.as_str()).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl ConversationSyncBackend for InMemoryConversationBackend {
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
        self.records.write().await.insert(call_id.0.clone(), conversation.clone());
        Ok(())
    }
}
