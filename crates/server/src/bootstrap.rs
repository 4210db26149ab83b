use std::sync::Arc;

use leadline_agent::{ConversationAnalyzer, DispatchRuntime};
use leadline_core::cache::ConversationCache;
use leadline_core::config::{AppConfig, ConfigError};
use leadline_core::notify::{NotificationDispatcher, NotificationTemplates, TemplateError};
use leadline_core::selection::{DispatchService, VendorSelectionEngine};
use leadline_db::{
    connect_with_config, migrations, DbPool, SqlConversationRecordRepository,
    SqlLocalConversationStore, SqlOrderRepository, SqlTriggerPointRepository, SqlVendorRepository,
};
use thiserror::Error;
use tracing::info;

use crate::providers::{http_client, HttpGeocoder, WebhookSender};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub cache: ConversationCache,
    pub runtime: DispatchRuntime,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("notification templates failed to load: {0}")]
    Templates(#[from] TemplateError),
    #[error("http client construction failed: {0}")]
    HttpClient(#[source] reqwest::Error),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    config.validate()?;

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let runtime = dispatch_runtime(&config, &db_pool)?;
    let cache = ConversationCache::new(
        Arc::new(SqlLocalConversationStore::new(db_pool.clone(), config.cache.local_entry_quota)),
        Arc::new(SqlConversationRecordRepository::new(db_pool.clone())),
        config.cache.clone(),
    )
    .with_completion_hook(Arc::new(runtime.clone()));

    let restored = cache.restore().await;
    info!(
        event_name = "system.bootstrap.cache_restored",
        correlation_id = "bootstrap",
        restored,
        "conversation cache restored"
    );

    Ok(Application { config, db_pool, cache, runtime })
}

fn dispatch_runtime(config: &AppConfig, db_pool: &DbPool) -> Result<DispatchRuntime, BootstrapError> {
    let client =
        http_client(config.notifications.timeout_secs).map_err(BootstrapError::HttpClient)?;
    let notifier = WebhookSender::all_from_config(&config.notifications, &client)
        .into_iter()
        .fold(NotificationDispatcher::new(NotificationTemplates::embedded()?), |notifier, sender| {
            notifier.with_sender(Arc::new(sender))
        });
    let geocoder =
        HttpGeocoder::from_config(&config.geocoding).map_err(BootstrapError::HttpClient)?;

    let dispatch = DispatchService::new(
        VendorSelectionEngine::new(config.dispatch.clone()),
        Arc::new(geocoder),
        Arc::new(SqlVendorRepository::new(db_pool.clone())),
        Arc::new(SqlOrderRepository::new(db_pool.clone())),
        notifier,
    );

    Ok(DispatchRuntime::new(
        Arc::new(ConversationAnalyzer::new()),
        Arc::new(SqlTriggerPointRepository::new(db_pool.clone())),
        dispatch,
    ))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use leadline_core::config::AppConfig;
    use leadline_core::domain::conversation::{
        CallId, CallMetadata, ConversationTurn, Speaker, SyncStatus,
    };

    use crate::bootstrap::{bootstrap_with_config, BootstrapError};

    fn config_for(database_url: &str) -> AppConfig {
        let mut config = AppConfig::default();
        config.database.url = database_url.to_string();
        config
    }

    #[tokio::test]
    async fn bootstrap_rejects_invalid_config_before_connecting() {
        let result = bootstrap_with_config(config_for("postgres://localhost/leadline")).await;

        let message = result.err().expect("error").to_string();
        assert!(message.contains("database.url"), "unexpected error: {message}");
    }

    #[tokio::test]
    async fn bootstrap_reports_an_unreachable_database() {
        let result =
            bootstrap_with_config(config_for("sqlite://does-not-exist/nested/leadline.db")).await;

        assert!(matches!(result, Err(BootstrapError::DatabaseConnect(_))));
    }

    #[tokio::test]
    async fn bootstrap_wires_the_cache_to_sqlite() {
        let app = bootstrap_with_config(config_for("sqlite::memory:"))
            .await
            .expect("bootstrap should succeed");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('vendor', 'dispatch_order', 'trigger_point', \
             'conversation_record', 'conversation_cache')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("baseline tables");
        assert_eq!(table_count, 5);

        let call_id = CallId("call-boot".to_string());
        app.cache
            .start_conversation(CallMetadata::new("call-boot", "+15550100", "inbound", Utc::now()))
            .await;
        app.cache
            .add_conversation_turn(
                &call_id,
                ConversationTurn::new("t1", Utc::now(), Speaker::Customer, "Just checking hours"),
            )
            .await;
        let ended = app.cache.end_conversation(&call_id, None).await.expect("ended");
        assert_eq!(ended.sync_status, SyncStatus::Synced);

        let (records,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM conversation_record WHERE call_id = 'call-boot'")
                .fetch_one(&app.db_pool)
                .await
                .expect("record count");
        assert_eq!(records, 1);

        app.cache.shutdown().await;
        app.db_pool.close().await;
    }
}
