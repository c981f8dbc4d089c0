use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub ingest: IngestConfig,
    #[serde(default)]
    pub geofence: GeofenceConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl DatabaseConfig {
    /// Pool settings for `persistence::db::create_pool`.
    pub fn pool_config(&self) -> persistence::db::DatabaseConfig {
        persistence::db::DatabaseConfig {
            url: self.url.clone(),
            max_connections: self.max_connections,
            min_connections: self.min_connections,
            connect_timeout_secs: self.connect_timeout_secs,
            idle_timeout_secs: self.idle_timeout_secs,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Storage backend behind the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    /// Process-local tables, for development and tests.
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,

    /// Bound on each store call made while processing a batch.
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,

    /// Largest `messages` array accepted in one webhook call.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

impl IngestConfig {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeofenceConfig {
    /// Fraction of the radius used as the hysteresis band.
    #[serde(default = "default_hysteresis_ratio")]
    pub hysteresis_ratio: f64,
}

impl Default for GeofenceConfig {
    fn default() -> Self {
        Self {
            hysteresis_ratio: default_hysteresis_ratio(),
        }
    }
}

/// Zone alert delivery.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Endpoint that receives zone alerts.
    #[serde(default)]
    pub topic_url: String,

    /// HMAC key for the `X-Signature` header. Unsigned when empty.
    #[serde(default)]
    pub signing_secret: String,

    #[serde(default = "default_notification_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookConfig {
    /// Echoed in the `x-nrfcloud-team-id` header of every webhook response.
    #[serde(default)]
    pub team_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_purge_batch_size")]
    pub purge_batch_size: i64,

    #[serde(default = "default_purge_interval_minutes")]
    pub purge_interval_minutes: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            purge_batch_size: default_purge_batch_size(),
            purge_interval_minutes: default_purge_interval_minutes(),
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    30
}
fn default_max_body_size() -> usize {
    4_194_304
}
fn default_max_connections() -> u32 {
    20
}
fn default_min_connections() -> u32 {
    5
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    600
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_backend() -> StorageBackend {
    StorageBackend::Postgres
}
fn default_store_timeout_ms() -> u64 {
    5_000
}
fn default_max_batch_size() -> usize {
    1_000
}
fn default_hysteresis_ratio() -> f64 {
    domain::services::geofence::HYSTERESIS_RATIO
}
fn default_notification_timeout_ms() -> u64 {
    5_000
}
fn default_purge_batch_size() -> i64 {
    10_000
}
fn default_purge_interval_minutes() -> u64 {
    60
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with FT__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("FT").separator("__"))
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Load configuration from embedded defaults plus overrides, without
    /// touching the config directory.
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let defaults = r#"
            [server]
            host = "127.0.0.1"
            port = 8080
            request_timeout_secs = 30
            max_body_size = 4194304

            [database]
            url = ""
            max_connections = 5
            min_connections = 1
            connect_timeout_secs = 10
            idle_timeout_secs = 600

            [logging]
            level = "info"
            format = "json"

            [ingest]
            backend = "memory"
            store_timeout_ms = 5000
            max_batch_size = 1000

            [geofence]
            hysteresis_ratio = 0.15

            [notifications]
            enabled = false
            topic_url = ""
            signing_secret = ""
            timeout_ms = 5000

            [webhook]
            team_id = "test-team"

            [retention]
            purge_batch_size = 10000
            purge_interval_minutes = 60
        "#;

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(defaults, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        // Validation is left to the caller so tests can build partial configs.
        builder.build()?.try_deserialize()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.ingest.backend == StorageBackend::Postgres && self.database.url.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "FT__DATABASE__URL environment variable must be set".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "Server port cannot be 0".to_string(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigValidationError::InvalidValue(
                "min_connections cannot exceed max_connections".to_string(),
            ));
        }

        if self.ingest.store_timeout_ms == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "ingest.store_timeout_ms must be positive".to_string(),
            ));
        }

        if self.ingest.max_batch_size == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "ingest.max_batch_size must be positive".to_string(),
            ));
        }

        let ratio = self.geofence.hysteresis_ratio;
        if !ratio.is_finite() || !(0.0..1.0).contains(&ratio) {
            return Err(ConfigValidationError::InvalidValue(
                "geofence.hysteresis_ratio must be in [0, 1)".to_string(),
            ));
        }

        if self.notifications.enabled && self.notifications.topic_url.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "notifications.topic_url is required when notifications are enabled".to_string(),
            ));
        }

        if self.retention.purge_batch_size <= 0 {
            return Err(ConfigValidationError::InvalidValue(
                "retention.purge_batch_size must be positive".to_string(),
            ));
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.server.host, self.server.port).parse()
    }
}
