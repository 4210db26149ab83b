use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use leadline_core::cache::ConversationCache;
use leadline_db::DbPool;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
    cache: ConversationCache,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub database: HealthCheck,
    pub cache: CacheCheck,
    pub checked_at: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CacheCheck {
    pub active_calls: usize,
    pub sync_task_running: bool,
}

pub fn router(db_pool: DbPool, cache: ConversationCache) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool, cache })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let ready = database.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "leadline-server runtime initialized".to_string(),
        },
        database,
        cache: CacheCheck {
            active_calls: state.cache.active_call_ids().await.len(),
            sync_task_running: state.cache.sync_task_running().await,
        },
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{extract::State, http::StatusCode, Json};
    use chrono::Utc;
    use leadline_core::cache::{ConversationCache, InMemoryConversationStore};
    use leadline_core::config::CacheConfig;
    use leadline_core::domain::conversation::CallMetadata;
    use leadline_db::{connect_with_settings, InMemoryConversationBackend};

    use crate::health::{health, HealthState};

    fn cache() -> ConversationCache {
        ConversationCache::new(
            Arc::new(InMemoryConversationStore::new()),
            Arc::new(InMemoryConversationBackend::default()),
            CacheConfig::default(),
        )
    }

    #[tokio::test]
    async fn health_returns_ready_when_database_is_reachable() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");
        let cache = cache();
        cache.start_conversation(CallMetadata::new("call-1", "+15550100", "inbound", Utc::now())).await;

        let (status, Json(payload)) =
            health(State(HealthState { db_pool: pool.clone(), cache: cache.clone() })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.database.status, "ready");
        assert_eq!(payload.service.status, "ready");
        assert_eq!(payload.cache.active_calls, 1);
        assert!(payload.cache.sync_task_running);

        cache.shutdown().await;
        pool.close().await;
    }

    #[tokio::test]
    async fn health_returns_service_unavailable_when_database_is_unavailable() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");
        pool.close().await;

        let (status, Json(payload)) = health(State(HealthState { db_pool: pool, cache: cache() })).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.database.status, "degraded");
        assert_eq!(payload.service.status, "ready");
        assert_eq!(payload.cache.active_calls, 0);
    }
}
