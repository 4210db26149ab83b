use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;

use leadline_core::cache::{
    storage_key, ConversationCache, ConversationSyncBackend, LocalConversationStore, StoreError,
};
use leadline_core::config::CacheConfig;
use leadline_core::domain::conversation::{
    CachedConversation, CallId, CallMetadata, ConversationTurn, Speaker, SyncStatus,
};
use leadline_core::domain::order::{Order, OrderId, OrderStatus, Priority};
use leadline_core::domain::trigger::{
    TriggerActions, TriggerConditions, TriggerPoint, TriggerPointId, TriggerType,
    VendorSelectionCriteria,
};
use leadline_core::domain::vendor::{
    NotificationPreferences, ServiceArea, ServiceCategory, VendorId, VendorProfile, VendorStatus,
};
use leadline_core::errors::ApplicationError;
use leadline_core::ports::{OrderStore, TriggerPointSource, VendorDirectory};
use leadline_db::{
    connect_with_settings, migrations, DbPool, InMemoryConversationBackend, InMemoryOrderStore,
    InMemoryTriggerPointSource, InMemoryVendorDirectory, SqlConversationRecordRepository,
    SqlLocalConversationStore, SqlOrderRepository, SqlTriggerPointRepository, SqlVendorRepository,
};

async fn setup() -> DbPool {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");
    pool
}

fn vendor(id: &str, owner_id: &str) -> VendorProfile {
    VendorProfile {
        id: VendorId(id.to_string()),
        owner_id: owner_id.to_string(),
        name: format!("Vendor {id}"),
        email: Some(format!("{id}@example.com")),
        phone: Some("+1 555 0100".to_string()),
        push_token: None,
        status: VendorStatus::Verified,
        services: vec!["plumbing".to_string(), "water heater".to_string()],
        location: Some("Boston, MA".to_string()),
        service_area: ServiceArea { latitude: 42.3601, longitude: -71.0589, radius_miles: 20.0 },
        active_orders: 1,
        max_capacity: 4,
        average_response_time_mins: 22.5,
        rating: 4.6,
        is_online: true,
        completion_rate: 0.93,
        cancellation_rate: 0.02,
        membership_months: 18,
        last_seen: Some(Utc.with_ymd_and_hms(2026, 3, 1, 14, 30, 0).unwrap()),
        notification_preferences: NotificationPreferences { email: true, sms: false, push: true },
    }
}

fn order(id: &str, call_id: &str, created_offset_secs: i64) -> Order {
    let created_at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
        + Duration::seconds(created_offset_secs);
    Order {
        order_id: OrderId(id.to_string()),
        call_id: Some(CallId(call_id.to_string())),
        owner_id: "owner-1".to_string(),
        customer_name: Some("Dana Reyes".to_string()),
        customer_phone: Some("+1 555 0142".to_string()),
        customer_email: None,
        customer_address: Some("12 Elm St, Boston".to_string()),
        service_type: ServiceCategory::Plumbing,
        description: "Water heater leaking into the basement".to_string(),
        priority: Priority::Urgent,
        status: OrderStatus::New,
        assigned_vendors: vec![VendorId("v-1".to_string()), VendorId("v-2".to_string())],
        primary_vendor_id: VendorId("v-1".to_string()),
        scheduled_date: created_at + Priority::Urgent.schedule_offset(),
        response_deadline: created_at + Priority::Urgent.response_window(),
        estimated_value: Decimal::new(30000, 2),
        created_at,
    }
}

fn trigger(id: &str, owner_id: &str) -> TriggerPoint {
    TriggerPoint {
        id: TriggerPointId(id.to_string()),
        owner_id: owner_id.to_string(),
        name: format!("Trigger {id}"),
        trigger_type: TriggerType::Emergency,
        keywords: vec!["leak".to_string(), "flooding".to_string()],
        conditions: TriggerConditions {
            require_location: true,
            require_contact: true,
            ..TriggerConditions::default()
        },
        actions: TriggerActions { priority_level: Some(Priority::Urgent), ..TriggerActions::default() },
        vendor_selection_criteria: VendorSelectionCriteria {
            location_radius: Some(15.0),
            max_vendors_to_notify: Some(2),
            prefer_available: true,
            ..VendorSelectionCriteria::default()
        },
        is_active: true,
    }
}

fn conversation(call_id: &str) -> CachedConversation {
    let started_at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    let mut conversation = CachedConversation::new(
        CallMetadata::new(call_id, "+1 555 0142", "inbound", started_at).with_owner("owner-1"),
    );
    conversation.push_turn(ConversationTurn::new(
        "t-1",
        started_at + Duration::seconds(3),
        Speaker::Customer,
        "My water heater is leaking",
    ));
    conversation
}

async fn assert_vendor_directory_contract(directory: &dyn VendorDirectory) {
    let pool = directory.vendor_pool("owner-1").await.expect("vendor pool");
    let ids = pool.iter().map(|vendor| vendor.id.0.as_str()).collect::<Vec<_>>();
    assert_eq!(ids, vec!["v-1", "v-2"]);
    assert_eq!(pool[0], vendor("v-1", "owner-1"));

    let empty = directory.vendor_pool("nobody").await.expect("empty pool");
    assert!(empty.is_empty());
}

#[tokio::test]
async fn vendor_directories_scope_the_pool_by_owner() {
    let pool = setup().await;
    let sql = SqlVendorRepository::new(pool);
    let memory = InMemoryVendorDirectory::default();
    for profile in [vendor("v-2", "owner-1"), vendor("v-1", "owner-1"), vendor("v-9", "owner-2")] {
        sql.save(&profile).await.expect("save vendor");
        memory.save(profile).await;
    }

    assert_vendor_directory_contract(&sql).await;
    assert_vendor_directory_contract(&memory).await;
}

#[tokio::test]
async fn saving_a_vendor_twice_updates_it_in_place() {
    let pool = setup().await;
    let repo = SqlVendorRepository::new(pool);
    let mut profile = vendor("v-1", "owner-1");
    repo.save(&profile).await.expect("insert");

    profile.active_orders = 3;
    profile.is_online = false;
    profile.status = VendorStatus::Blocked;
    repo.save(&profile).await.expect("update");

    let found = repo.find_by_id(&profile.id).await.expect("find").expect("vendor exists");
    assert_eq!(found, profile);
    assert_eq!(repo.list_for_owner("owner-1").await.expect("list").len(), 1);
}

#[tokio::test]
async fn orders_are_stored_and_listed_per_call() {
    let pool = setup().await;
    let sql = SqlOrderRepository::new(pool);
    let memory = InMemoryOrderStore::default();
    let stores: [&dyn OrderStore; 2] = [&sql, &memory];
    for store in stores {
        store.create(&order("o-2", "call-1", 60)).await.expect("create o-2");
        store.create(&order("o-1", "call-1", 0)).await.expect("create o-1");
        store.create(&order("o-3", "call-2", 0)).await.expect("create o-3");
    }

    let call_id = CallId("call-1".to_string());
    let from_sql = sql.list_for_call(&call_id).await.expect("list");
    let from_memory = memory.list_for_call(&call_id).await;
    assert_eq!(from_sql, from_memory);
    assert_eq!(
        from_sql.iter().map(|order| order.order_id.0.as_str()).collect::<Vec<_>>(),
        vec!["o-1", "o-2"]
    );

    let found = sql.find_by_id(&OrderId("o-3".to_string())).await.expect("find");
    assert_eq!(found, Some(order("o-3", "call-2", 0)));
    assert_eq!(memory.find_by_id(&OrderId("o-3".to_string())).await, Some(order("o-3", "call-2", 0)));
}

#[tokio::test]
async fn duplicate_orders_are_rejected() {
    let pool = setup().await;
    let sql = SqlOrderRepository::new(pool);
    let memory = InMemoryOrderStore::default();
    let stores: [&dyn OrderStore; 2] = [&sql, &memory];
    for store in stores {
        store.create(&order("o-1", "call-1", 0)).await.expect("first insert");
        let duplicate = store.create(&order("o-1", "call-1", 0)).await;
        assert!(matches!(duplicate, Err(ApplicationError::Persistence(_))));
    }
}

#[tokio::test]
async fn order_status_follows_the_lifecycle() {
    let pool = setup().await;
    let repo = SqlOrderRepository::new(pool);
    repo.insert(&order("o-1", "call-1", 0)).await.expect("insert");
    let id = OrderId("o-1".to_string());

    let accepted = repo.update_status(&id, OrderStatus::Accepted).await.expect("accept");
    assert_eq!(accepted.map(|order| order.status), Some(OrderStatus::Accepted));

    let skipped = repo.update_status(&id, OrderStatus::Completed).await;
    assert!(matches!(skipped, Err(ApplicationError::Domain(_))));
    let stored = repo.find_by_id(&id).await.expect("find").expect("order exists");
    assert_eq!(stored.status, OrderStatus::Accepted);

    let missing = repo
        .update_status(&OrderId("nope".to_string()), OrderStatus::Accepted)
        .await
        .expect("missing order is not an error");
    assert_eq!(missing, None);
}

#[tokio::test]
async fn trigger_points_come_back_in_configured_order() {
    let pool = setup().await;
    let sql = SqlTriggerPointRepository::new(pool);
    sql.save(&trigger("t-late", "owner-1"), 2).await.expect("save late");
    sql.save(&trigger("t-first", "owner-1"), 0).await.expect("save first");
    sql.save(&trigger("t-other", "owner-2"), 1).await.expect("save other");
    sql.save(&trigger("t-middle", "owner-1"), 1).await.expect("save middle");

    let memory = InMemoryTriggerPointSource::with_triggers(vec![
        trigger("t-first", "owner-1"),
        trigger("t-other", "owner-2"),
        trigger("t-middle", "owner-1"),
    ]);
    memory.push(trigger("t-late", "owner-1")).await;

    let sources: [&dyn TriggerPointSource; 2] = [&sql, &memory];
    for source in sources {
        let triggers = source.trigger_points("owner-1").await.expect("trigger points");
        assert_eq!(
            triggers.iter().map(|trigger| trigger.id.0.as_str()).collect::<Vec<_>>(),
            vec!["t-first", "t-middle", "t-late"]
        );
        assert_eq!(triggers[0], trigger("t-first", "owner-1"));
    }
}

#[tokio::test]
async fn conversation_backends_overwrite_by_call_id() {
    let pool = setup().await;
    let sql = SqlConversationRecordRepository::new(pool);
    let memory = InMemoryConversationBackend::default();
    let call_id = CallId("call-1".to_string());

    let first = conversation("call-1");
    let mut second = first.clone();
    second.push_turn(ConversationTurn::new(
        "t-2",
        Utc::now(),
        Speaker::Ai,
        "A plumber is on the way",
    ));

    let backends: [&dyn ConversationSyncBackend; 2] = [&sql, &memory];
    for backend in backends {
        backend.upsert(&call_id, &first).await.expect("first upsert");
        backend.upsert(&call_id, &second).await.expect("second upsert");
        let mismatched = backend.upsert(&CallId("call-2".to_string()), &second).await;
        assert!(matches!(mismatched, Err(ApplicationError::Persistence(_))));
    }

    assert_eq!(sql.find(&call_id).await.expect("find"), Some(second.clone()));
    assert_eq!(memory.find(&call_id).await, Some(second));
    assert_eq!(memory.len().await, 1);
    assert_eq!(sql.find(&CallId("call-2".to_string())).await.expect("find"), None);
}

#[tokio::test]
async fn local_store_enforces_its_entry_quota() {
    let pool = setup().await;
    let store = SqlLocalConversationStore::new(pool, 2);

    store.write("a", "1").await.expect("write a");
    store.write("b", "2").await.expect("write b");
    let error = store.write("c", "3").await.expect_err("quota reached");
    assert_eq!(error, StoreError::QuotaExceeded { limit: 2 });

    store.write("a", "updated").await.expect("overwriting an existing key is allowed");
    assert_eq!(store.read("a").await.expect("read"), Some("updated".to_string()));

    store.remove("b").await.expect("remove");
    store.write("c", "3").await.expect("room after remove");
    assert_eq!(store.keys().await.expect("keys"), vec!["a".to_string(), "c".to_string()]);
    assert_eq!(store.read("b").await.expect("read removed"), None);
}

#[tokio::test]
async fn cache_persists_locally_and_syncs_to_the_record_table() {
    let pool = setup().await;
    let store = Arc::new(SqlLocalConversationStore::new(pool.clone(), 50));
    let records = Arc::new(SqlConversationRecordRepository::new(pool.clone()));
    let cache = ConversationCache::new(store.clone(), records.clone(), CacheConfig::default());

    let metadata = CallMetadata::new("call-7", "+1 555 0199", "inbound", Utc::now());
    cache.start_conversation(metadata).await;
    let call_id = CallId("call-7".to_string());
    assert!(
        cache
            .add_conversation_turn(
                &call_id,
                ConversationTurn::new("t-1", Utc::now(), Speaker::Customer, "Pipe burst in the kitchen"),
            )
            .await
    );
    assert!(store.read(&storage_key(&call_id)).await.expect("read").is_some());

    let ended = cache.end_conversation(&call_id, None).await.expect("ended");
    cache.shutdown().await;
    assert_eq!(ended.sync_status, SyncStatus::Synced);

    let record = records.find(&call_id).await.expect("find").expect("record synced");
    assert_eq!(record.turns().len(), 1);
    assert!(record.metadata.ended_at.is_some());

    let restarted =
        ConversationCache::new(store, Arc::new(InMemoryConversationBackend::default()), CacheConfig::default());
    assert_eq!(restarted.restore().await, 1);
    assert!(restarted.active_call_ids().await.is_empty());
    assert_eq!(restarted.cleanup_synced().await, 1);
    assert!(restarted.get_conversation(&call_id).await.is_none());
}
