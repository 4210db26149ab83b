use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub dispatch: DispatchConfig,
    pub cache: CacheConfig,
    pub geocoding: GeocodingConfig,
    pub notifications: NotificationsConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

/// Fallbacks for vendor selection when a trigger point leaves a criterion unset.
#[derive(Clone, Debug, PartialEq)]
pub struct DispatchConfig {
    pub default_owner_id: String,
    pub default_radius_miles: f64,
    pub min_rating: f64,
    pub max_response_time_mins: f64,
    pub vendor_idle_hours: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheConfig {
    pub sync_interval_secs: u64,
    pub max_cached_conversations: usize,
    pub local_entry_quota: usize,
}

#[derive(Clone, Debug)]
pub struct GeocodingConfig {
    pub base_url: Option<String>,
    pub api_key: Option<SecretString>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct NotificationsConfig {
    pub email_webhook_url: Option<String>,
    pub sms_webhook_url: Option<String>,
    pub push_webhook_url: Option<String>,
    pub api_token: Option<SecretString>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub default_owner_id: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://leadline.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            dispatch: DispatchConfig::default(),
            cache: CacheConfig::default(),
            geocoding: GeocodingConfig { base_url: None, api_key: None, timeout_secs: 10 },
            notifications: NotificationsConfig {
                email_webhook_url: None,
                sms_webhook_url: None,
                push_webhook_url: None,
                api_token: None,
                timeout_secs: 10,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            default_owner_id: "default".to_string(),
            default_radius_miles: 25.0,
            min_rating: 3.5,
            max_response_time_mins: 60.0,
            vendor_idle_hours: 24,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { sync_interval_secs: 30, max_cached_conversations: 50, local_entry_quota: 200 }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("leadline.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(dispatch) = patch.dispatch {
            if let Some(default_owner_id) = dispatch.default_owner_id {
                self.dispatch.default_owner_id = default_owner_id;
            }
            if let Some(default_radius_miles) = dispatch.default_radius_miles {
                self.dispatch.default_radius_miles = default_radius_miles;
            }
            if let Some(min_rating) = dispatch.min_rating {
                self.dispatch.min_rating = min_rating;
            }
            if let Some(max_response_time_mins) = dispatch.max_response_time_mins {
                self.dispatch.max_response_time_mins = max_response_time_mins;
            }
            if let Some(vendor_idle_hours) = dispatch.vendor_idle_hours {
                self.dispatch.vendor_idle_hours = vendor_idle_hours;
            }
        }

        if let Some(cache) = patch.cache {
            if let Some(sync_interval_secs) = cache.sync_interval_secs {
                self.cache.sync_interval_secs = sync_interval_secs;
            }
            if let Some(max_cached_conversations) = cache.max_cached_conversations {
                self.cache.max_cached_conversations = max_cached_conversations;
            }
            if let Some(local_entry_quota) = cache.local_entry_quota {
                self.cache.local_entry_quota = local_entry_quota;
            }
        }

        if let Some(geocoding) = patch.geocoding {
            if let Some(base_url) = geocoding.base_url {
                self.geocoding.base_url = Some(base_url);
            }
            if let Some(geocoding_api_key_value) = geocoding.api_key {
                self.geocoding.api_key = Some(secret_value(geocoding_api_key_value));
            }
            if let Some(timeout_secs) = geocoding.timeout_secs {
                self.geocoding.timeout_secs = timeout_secs;
            }
        }

        if let Some(notifications) = patch.notifications {
            if let Some(url) = notifications.email_webhook_url {
                self.notifications.email_webhook_url = Some(url);
            }
            if let Some(url) = notifications.sms_webhook_url {
                self.notifications.sms_webhook_url = Some(url);
            }
            if let Some(url) = notifications.push_webhook_url {
                self.notifications.push_webhook_url = Some(url);
            }
            if let Some(notifications_api_token_value) = notifications.api_token {
                self.notifications.api_token = Some(secret_value(notifications_api_token_value));
            }
            if let Some(timeout_secs) = notifications.timeout_secs {
                self.notifications.timeout_secs = timeout_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("LEADLINE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("LEADLINE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_env("LEADLINE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("LEADLINE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_env("LEADLINE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("LEADLINE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("LEADLINE_SERVER_PORT") {
            self.server.port = parse_env("LEADLINE_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("LEADLINE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_env("LEADLINE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("LEADLINE_DISPATCH_DEFAULT_OWNER_ID") {
            self.dispatch.default_owner_id = value;
        }
        if let Some(value) = read_env("LEADLINE_DISPATCH_DEFAULT_RADIUS_MILES") {
            self.dispatch.default_radius_miles =
                parse_env("LEADLINE_DISPATCH_DEFAULT_RADIUS_MILES", &value)?;
        }
        if let Some(value) = read_env("LEADLINE_DISPATCH_MIN_RATING") {
            self.dispatch.min_rating = parse_env("LEADLINE_DISPATCH_MIN_RATING", &value)?;
        }
        if let Some(value) = read_env("LEADLINE_DISPATCH_MAX_RESPONSE_TIME_MINS") {
            self.dispatch.max_response_time_mins =
                parse_env("LEADLINE_DISPATCH_MAX_RESPONSE_TIME_MINS", &value)?;
        }
        if let Some(value) = read_env("LEADLINE_DISPATCH_VENDOR_IDLE_HOURS") {
            self.dispatch.vendor_idle_hours =
                parse_env("LEADLINE_DISPATCH_VENDOR_IDLE_HOURS", &value)?;
        }

        if let Some(value) = read_env("LEADLINE_CACHE_SYNC_INTERVAL_SECS") {
            self.cache.sync_interval_secs = parse_env("LEADLINE_CACHE_SYNC_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = read_env("LEADLINE_CACHE_MAX_CACHED_CONVERSATIONS") {
            self.cache.max_cached_conversations =
                parse_env("LEADLINE_CACHE_MAX_CACHED_CONVERSATIONS", &value)?;
        }
        if let Some(value) = read_env("LEADLINE_CACHE_LOCAL_ENTRY_QUOTA") {
            self.cache.local_entry_quota = parse_env("LEADLINE_CACHE_LOCAL_ENTRY_QUOTA", &value)?;
        }

        if let Some(value) = read_env("LEADLINE_GEOCODING_BASE_URL") {
            self.geocoding.base_url = Some(value);
        }
        if let Some(value) = read_env("LEADLINE_GEOCODING_API_KEY") {
            self.geocoding.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("LEADLINE_GEOCODING_TIMEOUT_SECS") {
            self.geocoding.timeout_secs = parse_env("LEADLINE_GEOCODING_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("LEADLINE_NOTIFICATIONS_EMAIL_WEBHOOK_URL") {
            self.notifications.email_webhook_url = Some(value);
        }
        if let Some(value) = read_env("LEADLINE_NOTIFICATIONS_SMS_WEBHOOK_URL") {
            self.notifications.sms_webhook_url = Some(value);
        }
        if let Some(value) = read_env("LEADLINE_NOTIFICATIONS_PUSH_WEBHOOK_URL") {
            self.notifications.push_webhook_url = Some(value);
        }
        if let Some(value) = read_env("LEADLINE_NOTIFICATIONS_API_TOKEN") {
            self.notifications.api_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("LEADLINE_NOTIFICATIONS_TIMEOUT_SECS") {
            self.notifications.timeout_secs =
                parse_env("LEADLINE_NOTIFICATIONS_TIMEOUT_SECS", &value)?;
        }

        let log_level =
            read_env("LEADLINE_LOGGING_LEVEL").or_else(|| read_env("LEADLINE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("LEADLINE_LOGGING_FORMAT").or_else(|| read_env("LEADLINE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(default_owner_id) = overrides.default_owner_id {
            self.dispatch.default_owner_id = default_owner_id;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_dispatch(&self.dispatch)?;
        validate_cache(&self.cache)?;
        validate_geocoding(&self.geocoding)?;
        validate_notifications(&self.notifications)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

impl GeocodingConfig {
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_ref().map(|key| key.expose_secret())
    }
}

impl NotificationsConfig {
    pub fn api_token(&self) -> Option<&str> {
        self.api_token.as_ref().map(|token| token.expose_secret())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("leadline.toml"), PathBuf::from("config/leadline.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_dispatch(dispatch: &DispatchConfig) -> Result<(), ConfigError> {
    if dispatch.default_owner_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "dispatch.default_owner_id must not be empty".to_string(),
        ));
    }
    if !(dispatch.default_radius_miles > 0.0) || !dispatch.default_radius_miles.is_finite() {
        return Err(ConfigError::Validation(
            "dispatch.default_radius_miles must be a positive number of miles".to_string(),
        ));
    }
    if !(0.0..=5.0).contains(&dispatch.min_rating) {
        return Err(ConfigError::Validation(
            "dispatch.min_rating must be in range 0..=5".to_string(),
        ));
    }
    if !(dispatch.max_response_time_mins > 0.0) || !dispatch.max_response_time_mins.is_finite() {
        return Err(ConfigError::Validation(
            "dispatch.max_response_time_mins must be a positive number of minutes".to_string(),
        ));
    }
    if dispatch.vendor_idle_hours <= 0 {
        return Err(ConfigError::Validation(
            "dispatch.vendor_idle_hours must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_cache(cache: &CacheConfig) -> Result<(), ConfigError> {
    if cache.sync_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "cache.sync_interval_secs must be greater than zero".to_string(),
        ));
    }
    if cache.max_cached_conversations == 0 {
        return Err(ConfigError::Validation(
            "cache.max_cached_conversations must be greater than zero".to_string(),
        ));
    }
    // Eviction keeps up to the cap plus the entry being written.
    if cache.local_entry_quota <= cache.max_cached_conversations {
        return Err(ConfigError::Validation(
            "cache.local_entry_quota must be greater than cache.max_cached_conversations"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_geocoding(geocoding: &GeocodingConfig) -> Result<(), ConfigError> {
    validate_http_url("geocoding.base_url", geocoding.base_url.as_deref())?;
    if geocoding.timeout_secs == 0 || geocoding.timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "geocoding.timeout_secs must be in range 1..=120".to_string(),
        ));
    }
    Ok(())
}

fn validate_notifications(notifications: &NotificationsConfig) -> Result<(), ConfigError> {
    validate_http_url(
        "notifications.email_webhook_url",
        notifications.email_webhook_url.as_deref(),
    )?;
    validate_http_url("notifications.sms_webhook_url", notifications.sms_webhook_url.as_deref())?;
    validate_http_url(
        "notifications.push_webhook_url",
        notifications.push_webhook_url.as_deref(),
    )?;
    if notifications.timeout_secs == 0 || notifications.timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "notifications.timeout_secs must be in range 1..=120".to_string(),
        ));
    }
    Ok(())
}

fn validate_http_url(key: &str, value: Option<&str>) -> Result<(), ConfigError> {
    if let Some(url) = value {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "{key} must start with http:// or https://"
            )));
        }
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    dispatch: Option<DispatchPatch>,
    cache: Option<CachePatch>,
    geocoding: Option<GeocodingPatch>,
    notifications: Option<NotificationsPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct DispatchPatch {
    default_owner_id: Option<String>,
    default_radius_miles: Option<f64>,
    min_rating: Option<f64>,
    max_response_time_mins: Option<f64>,
    vendor_idle_hours: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct CachePatch {
    sync_interval_secs: Option<u64>,
    max_cached_conversations: Option<usize>,
    local_entry_quota: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct GeocodingPatch {
    base_url: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct NotificationsPatch {
    email_webhook_url: Option<String>,
    sms_webhook_url: Option<String>,
    push_webhook_url: Option<String>,
    api_token: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_GEOCODER_KEY", "geo-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("leadline.toml");
            fs::write(
                &path,
                r#"
[geocoding]
base_url = "https://geo.example.test"
api_key = "${TEST_GEOCODER_KEY}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.geocoding.api_key() == Some("geo-from-env"),
                "geocoding key should be loaded from environment",
            )?;
            ensure(
                config.geocoding.base_url.as_deref() == Some("https://geo.example.test"),
                "geocoding base url should come from the file",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_GEOCODER_KEY"]);
        result
    }

    #[test]
    fn missing_interpolation_variable_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("leadline.toml");
        fs::write(&path, "[notifications]\napi_token = \"${LEADLINE_TEST_UNSET_TOKEN}\"\n")
            .map_err(|err| err.to_string())?;

        let error = match AppConfig::load(LoadOptions {
            config_path: Some(path),
            ..LoadOptions::default()
        }) {
            Ok(_) => return Err("expected interpolation failure".to_string()),
            Err(error) => error,
        };
        ensure(
            matches!(error, ConfigError::MissingEnvInterpolation { ref var } if var == "LEADLINE_TEST_UNSET_TOKEN"),
            "error should name the missing variable",
        )
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("LEADLINE_LOG_LEVEL", "warn");
        env::set_var("LEADLINE_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["LEADLINE_LOG_LEVEL", "LEADLINE_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("LEADLINE_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("LEADLINE_DISPATCH_MIN_RATING", "4.2");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("leadline.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[dispatch]
min_rating = 3.0
default_radius_miles = 40.0

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                (config.dispatch.min_rating - 4.2).abs() < 1e-9,
                "env min rating should win over file and defaults",
            )?;
            ensure(
                (config.dispatch.default_radius_miles - 40.0).abs() < 1e-9,
                "file radius should win over defaults",
            )?;
            Ok(())
        })();

        clear_vars(&["LEADLINE_DATABASE_URL", "LEADLINE_DISPATCH_MIN_RATING"]);
        result
    }

    #[test]
    fn invalid_env_number_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("LEADLINE_CACHE_SYNC_INTERVAL_SECS", "soon");
        let result = match AppConfig::load(LoadOptions::default()) {
            Ok(_) => Err("expected invalid override failure".to_string()),
            Err(error) => ensure(
                matches!(error, ConfigError::InvalidEnvOverride { ref key, .. } if key == "LEADLINE_CACHE_SYNC_INTERVAL_SECS"),
                "error should name the env key",
            ),
        };

        clear_vars(&["LEADLINE_CACHE_SYNC_INTERVAL_SECS"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("LEADLINE_NOTIFICATIONS_EMAIL_WEBHOOK_URL", "smtp.example.test");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("notifications.email_webhook_url")
            );
            ensure(has_message, "validation failure should mention the webhook url key")
        })();

        clear_vars(&["LEADLINE_NOTIFICATIONS_EMAIL_WEBHOOK_URL"]);
        result
    }

    #[test]
    fn local_quota_must_leave_room_beyond_the_eviction_cap() -> Result<(), String> {
        let mut config = AppConfig::default();
        config.cache.max_cached_conversations = 20;
        config.cache.local_entry_quota = 20;

        let rejected = matches!(
            config.validate(),
            Err(ConfigError::Validation(ref message)) if message.contains("cache.local_entry_quota")
        );
        ensure(rejected, "a quota equal to the eviction cap should be rejected")?;

        config.cache.local_entry_quota = 21;
        config.validate().map_err(|error| format!("quota above the cap should pass: {error}"))
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("LEADLINE_GEOCODING_API_KEY", "geo-secret-value");
        env::set_var("LEADLINE_NOTIFICATIONS_API_TOKEN", "notify-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("geo-secret-value"), "debug output should not contain api key")?;
            ensure(
                !debug.contains("notify-secret-value"),
                "debug output should not contain api token",
            )?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&["LEADLINE_GEOCODING_API_KEY", "LEADLINE_NOTIFICATIONS_API_TOKEN"]);
        result
    }

    #[test]
    fn require_file_reports_missing_path() {
        let error = AppConfig::load(LoadOptions {
            config_path: Some("does-not-exist/leadline.toml".into()),
            require_file: true,
            ..LoadOptions::default()
        })
        .expect_err("missing file must fail");
        assert!(matches!(error, ConfigError::MissingConfigFile(_)));
    }
}
