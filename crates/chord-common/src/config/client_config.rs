//! Client configuration structs
//!
//! Loads configuration from environment variables or from a config file with
//! environment overrides.

use chord_core::{Intents, Snowflake};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Main client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub app: AppSettings,
    /// Bot token sent as `Authorization: Bot <token>` and in Identify
    pub token: String,
    /// Application id, needed for command registration
    #[serde(default)]
    pub application_id: Option<Snowflake>,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default)]
    pub env: Environment,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            env: Environment::default(),
        }
    }
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" => Ok(Self::Production),
            "staging" => Ok(Self::Staging),
            "development" => Ok(Self::Development),
            other => Err(ConfigError::InvalidValue("APP_ENV", other.to_string())),
        }
    }
}

/// Gateway connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Gateway URL; discovered through the REST API when unset
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_api_version")]
    pub api_version: u8,
    #[serde(default)]
    pub intents: Intents,
    /// Total shard count; the service's recommendation is used when unset
    #[serde(default)]
    pub shard_count: Option<u32>,
    /// Subset of shards run by this process (all shards when unset)
    #[serde(default)]
    pub shard_ids: Option<Vec<u32>>,
    #[serde(default = "default_identify_stagger_ms")]
    pub identify_stagger_ms: u64,
    #[serde(default = "default_hello_timeout_ms")]
    pub hello_timeout_ms: u64,
    #[serde(default = "default_large_threshold")]
    pub large_threshold: u8,
    /// Capacity of the queue between shard readers and the dispatcher
    #[serde(default = "default_dispatch_buffer")]
    pub dispatch_buffer: usize,
    /// Outbound gateway commands allowed per minute per shard
    #[serde(default = "default_commands_per_minute")]
    pub commands_per_minute: u32,
}

impl GatewayConfig {
    #[must_use]
    pub fn identify_stagger(&self) -> Duration {
        Duration::from_millis(self.identify_stagger_ms)
    }

    #[must_use]
    pub fn hello_timeout(&self) -> Duration {
        Duration::from_millis(self.hello_timeout_ms)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_version: default_api_version(),
            intents: Intents::default(),
            shard_count: None,
            shard_ids: None,
            identify_stagger_ms: default_identify_stagger_ms(),
            hello_timeout_ms: default_hello_timeout_ms(),
            large_threshold: default_large_threshold(),
            dispatch_buffer: default_dispatch_buffer(),
            commands_per_minute: default_commands_per_minute(),
        }
    }
}

/// REST transport settings
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_http_timeout_ms")]
    pub timeout_ms: u64,
    /// Attempts per request, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay for 5xx / transport retries, doubled each attempt
    #[serde(default = "default_server_error_backoff_ms")]
    pub server_error_backoff_ms: u64,
    /// Proactive cap across all routes
    #[serde(default = "default_global_per_second")]
    pub global_per_second: u32,
}

impl HttpConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    #[must_use]
    pub fn server_error_backoff(&self) -> Duration {
        Duration::from_millis(self.server_error_backoff_ms)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_http_timeout_ms(),
            max_attempts: default_max_attempts(),
            server_error_backoff_ms: default_server_error_backoff_ms(),
            global_per_second: default_global_per_second(),
        }
    }
}

/// Gateway reconnect backoff
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_reconnect_min_ms")]
    pub min_delay_ms: u64,
    #[serde(default = "default_reconnect_max_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_reconnect_factor")]
    pub factor: f64,
}

impl ReconnectConfig {
    #[must_use]
    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    #[must_use]
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: default_reconnect_min_ms(),
            max_delay_ms: default_reconnect_max_ms(),
            factor: default_reconnect_factor(),
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "chord".to_string()
}

fn default_api_version() -> u8 {
    10
}

fn default_identify_stagger_ms() -> u64 {
    5_000
}

fn default_hello_timeout_ms() -> u64 {
    20_000
}

fn default_large_threshold() -> u8 {
    50
}

fn default_dispatch_buffer() -> usize {
    1024
}

fn default_commands_per_minute() -> u32 {
    120
}

fn default_base_url() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_http_timeout_ms() -> u64 {
    15_000
}

fn default_max_attempts() -> u32 {
    5
}

fn default_server_error_backoff_ms() -> u64 {
    500
}

fn default_global_per_second() -> u32 {
    50
}

fn default_reconnect_min_ms() -> u64 {
    1_000
}

fn default_reconnect_max_ms() -> u64 {
    60_000
}

fn default_reconnect_factor() -> f64 {
    2.0
}

/// Read and parse an optional environment variable
fn parse_var<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(name, raw)),
        _ => Ok(None),
    }
}

impl ClientConfig {
    /// Configuration with defaults for everything but the token
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            app: AppSettings::default(),
            token: token.into(),
            application_id: None,
            gateway: GatewayConfig::default(),
            http: HttpConfig::default(),
            reconnect: ReconnectConfig::default(),
        }
    }

    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if `CHORD_TOKEN` is missing or a variable fails to parse
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let token = env::var("CHORD_TOKEN").map_err(|_| ConfigError::MissingVar("CHORD_TOKEN"))?;
        let mut config = Self::new(token);

        config.app.name = env::var("APP_NAME").unwrap_or_else(|_| default_app_name());
        if let Some(app_env) = parse_var::<Environment>("APP_ENV")? {
            config.app.env = app_env;
        }
        config.application_id = parse_var("CHORD_APPLICATION_ID")?;

        let gateway = &mut config.gateway;
        gateway.url = env::var("CHORD_GATEWAY_URL").ok().filter(|s| !s.is_empty());
        if let Some(version) = parse_var("CHORD_API_VERSION")? {
            gateway.api_version = version;
        }
        if let Ok(raw) = env::var("CHORD_INTENTS") {
            gateway.intents = Intents::parse(&raw)
                .ok_or(ConfigError::InvalidValue("CHORD_INTENTS", raw))?;
        }
        gateway.shard_count = parse_var("CHORD_SHARD_COUNT")?;
        if let Ok(raw) = env::var("CHORD_SHARD_IDS") {
            let ids = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::parse)
                .collect::<Result<Vec<u32>, _>>()
                .map_err(|_| ConfigError::InvalidValue("CHORD_SHARD_IDS", raw.clone()))?;
            gateway.shard_ids = Some(ids);
        }
        if let Some(ms) = parse_var("CHORD_IDENTIFY_STAGGER_MS")? {
            gateway.identify_stagger_ms = ms;
        }
        if let Some(ms) = parse_var("CHORD_HELLO_TIMEOUT_MS")? {
            gateway.hello_timeout_ms = ms;
        }

        let http = &mut config.http;
        if let Ok(url) = env::var("CHORD_API_BASE_URL") {
            http.base_url = url;
        }
        if let Some(ms) = parse_var("CHORD_HTTP_TIMEOUT_MS")? {
            http.timeout_ms = ms;
        }
        if let Some(attempts) = parse_var("CHORD_HTTP_MAX_ATTEMPTS")? {
            http.max_attempts = attempts;
        }

        let reconnect = &mut config.reconnect;
        if let Some(ms) = parse_var("CHORD_RECONNECT_MIN_MS")? {
            reconnect.min_delay_ms = ms;
        }
        if let Some(ms) = parse_var("CHORD_RECONNECT_MAX_MS")? {
            reconnect.max_delay_ms = ms;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file (TOML, YAML or JSON by extension),
    /// overridden by `CHORD__SECTION__KEY` style environment variables.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let config: Self = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(config::Environment::with_prefix("CHORD").prefix_separator("__").separator("__"))
            .build()
            .and_then(config::Config::try_deserialize)
            .map_err(|e| ConfigError::Load(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Cross-field checks
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token.trim().is_empty() {
            return Err(ConfigError::MissingVar("CHORD_TOKEN"));
        }
        if self.gateway.shard_count == Some(0) {
            return Err(ConfigError::InvalidValue("CHORD_SHARD_COUNT", "0".to_string()));
        }
        if let (Some(count), Some(ids)) = (self.gateway.shard_count, &self.gateway.shard_ids) {
            if let Some(bad) = ids.iter().find(|id| **id >= count) {
                return Err(ConfigError::InvalidValue("CHORD_SHARD_IDS", bad.to_string()));
            }
        }
        if self.reconnect.min_delay_ms > self.reconnect.max_delay_ms {
            return Err(ConfigError::InvalidValue(
                "CHORD_RECONNECT_MIN_MS",
                self.reconnect.min_delay_ms.to_string(),
            ));
        }
        if self.http.max_attempts == 0 {
            return Err(ConfigError::InvalidValue("CHORD_HTTP_MAX_ATTEMPTS", "0".to_string()));
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),

    #[error("Failed to load configuration: {0}")]
    Load(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_environment_from_str() {
        assert_eq!("Production".parse::<Environment>().unwrap(), Environment::Production);
        assert!(Environment::Staging.eq(&"staging".parse().unwrap()));
        assert!("qa".parse::<Environment>().is_err());
        assert!(Environment::Production.is_production());
        assert!(Environment::Development.is_development());
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new("token");
        assert_eq!(config.gateway.api_version, 10);
        assert_eq!(config.gateway.identify_stagger(), Duration::from_secs(5));
        assert_eq!(config.gateway.intents, Intents::NON_PRIVILEGED);
        assert_eq!(config.http.max_attempts, 5);
        assert_eq!(config.reconnect.min_delay(), Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_shards() {
        let mut config = ClientConfig::new("token");
        config.gateway.shard_count = Some(2);
        config.gateway.shard_ids = Some(vec![0, 2]);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue("CHORD_SHARD_IDS", _))
        ));

        config.gateway.shard_count = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_token() {
        let config = ClientConfig::new("  ");
        assert!(matches!(config.validate(), Err(ConfigError::MissingVar("CHORD_TOKEN"))));
    }

    #[test]
    fn test_from_file() {
        let dir = env::temp_dir().join(format!("chord-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("client.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
token = "abc"
application_id = "42"

[gateway]
intents = 513
shard_count = 4

[reconnect]
max_delay_ms = 30000
"#
        )
        .unwrap();

        let config = ClientConfig::from_file(&path).unwrap();
        assert_eq!(config.token, "abc");
        assert_eq!(config.application_id, Some(Snowflake::new(42)));
        assert_eq!(config.gateway.intents, Intents::GUILDS | Intents::GUILD_MESSAGES);
        assert_eq!(config.gateway.shard_count, Some(4));
        assert_eq!(config.reconnect.max_delay_ms, 30_000);
        assert_eq!(config.reconnect.min_delay_ms, 1_000);

        std::fs::remove_dir_all(&dir).ok();
    }
}
