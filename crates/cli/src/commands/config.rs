use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use leadline_core::config::{AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key_path, value) in effective_values(&config) {
        let env_key = env_key_for(key_path);
        let source = field_source(
            key_path,
            Some(&env_key),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(key_path, &value, source));
    }

    lines.join("\n")
}

fn effective_values(config: &AppConfig) -> Vec<(&'static str, String)> {
    let optional = |value: &Option<String>| value.clone().unwrap_or_else(|| "<unset>".to_string());
    let secret = |value: &Option<SecretString>| {
        value.as_ref().map(|secret| redact_secret(secret.expose_secret())).unwrap_or_else(|| {
            "<unset>".to_string()
        })
    };

    vec![
        ("database.url", config.database.url.clone()),
        ("database.max_connections", config.database.max_connections.to_string()),
        ("database.timeout_secs", config.database.timeout_secs.to_string()),
        ("server.bind_address", config.server.bind_address.clone()),
        ("server.port", config.server.port.to_string()),
        ("server.graceful_shutdown_secs", config.server.graceful_shutdown_secs.to_string()),
        ("dispatch.default_owner_id", config.dispatch.default_owner_id.clone()),
        ("dispatch.default_radius_miles", config.dispatch.default_radius_miles.to_string()),
        ("dispatch.min_rating", config.dispatch.min_rating.to_string()),
        ("dispatch.max_response_time_mins", config.dispatch.max_response_time_mins.to_string()),
        ("dispatch.vendor_idle_hours", config.dispatch.vendor_idle_hours.to_string()),
        ("cache.sync_interval_secs", config.cache.sync_interval_secs.to_string()),
        ("cache.max_cached_conversations", config.cache.max_cached_conversations.to_string()),
        ("cache.local_entry_quota", config.cache.local_entry_quota.to_string()),
        ("geocoding.base_url", optional(&config.geocoding.base_url)),
        ("geocoding.api_key", secret(&config.geocoding.api_key)),
        ("geocoding.timeout_secs", config.geocoding.timeout_secs.to_string()),
        ("notifications.email_webhook_url", optional(&config.notifications.email_webhook_url)),
        ("notifications.sms_webhook_url", optional(&config.notifications.sms_webhook_url)),
        ("notifications.push_webhook_url", optional(&config.notifications.push_webhook_url)),
        ("notifications.api_token", secret(&config.notifications.api_token)),
        ("notifications.timeout_secs", config.notifications.timeout_secs.to_string()),
        ("logging.level", config.logging.level.clone()),
        ("logging.format", format!("{:?}", config.logging.format)),
    ]
}

/// `dispatch.min_rating` -> `LEADLINE_DISPATCH_MIN_RATING`
fn env_key_for(key_path: &str) -> String {
    format!("LEADLINE_{}", key_path.replace('.', "_").to_ascii_uppercase())
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("leadline.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/leadline.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_secret(secret: &str) -> String {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    match trimmed.get(..4) {
        Some(prefix) if trimmed.len() > 8 => format!("{prefix}***"),
        _ => "<redacted>".to_string(),
    }
}
