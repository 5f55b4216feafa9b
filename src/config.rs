use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::network::{Network, NetworkParams};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub network: NetworkConfig,
    pub watcher: WatcherConfig,
    pub cursor: CursorConfig,
    pub logging: LoggingConfig,
}

/// Ledger API client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Overrides the network's default API base URL
    pub endpoint: Option<String>,
    /// Sent as the `TRON-PRO-API-KEY` header when present
    pub api_key: Option<String>,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Maximum number of attempts per request
    pub max_retries: u32,
    /// Initial retry delay in milliseconds
    pub retry_delay_ms: u64,
    /// Maximum retry delay in milliseconds
    pub max_retry_delay_ms: u64,
}

/// Network selection plus per-network overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub network: Network,
    pub version_byte: Option<u8>,
    pub token_contract: Option<String>,
    pub token_symbol: Option<String>,
    pub transfer_event_signature: Option<String>,
}

/// Catch-up controller tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Wait between head polls in milliseconds
    pub poll_interval_ms: u64,
    /// Maximum blocks processed per poll tick, 0 for no cap
    pub catch_up_batch_cap: u64,
    /// Enriched transactions between rate-limit pauses
    pub rate_limit_batch: usize,
    /// Rate-limit pause in milliseconds
    pub rate_limit_pause_ms: u64,
    /// Event channel capacity; a full channel blocks the watcher
    pub channel_capacity: usize,
    /// Consecutive failed ticks before the watcher gives up, 0 retries forever
    pub max_consecutive_failures: u32,
    /// Stop the watcher after this many seconds
    pub deadline_seconds: Option<u64>,
}

/// Cursor storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CursorConfig {
    /// SQLite database file path
    pub path: String,
    /// Height used when the cursor is created for the first time
    pub start_height: Option<u64>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout_seconds: 30,
            max_retries: 3,
            retry_delay_ms: 500,
            max_retry_delay_ms: 5_000,
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 3_000,
            catch_up_batch_cap: 100,
            rate_limit_batch: 15,
            rate_limit_pause_ms: 1_000,
            channel_capacity: 1,
            max_consecutive_failures: 10,
            deadline_seconds: None,
        }
    }
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            path: "./cursor.db".to_string(),
            start_height: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl WatcherConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn rate_limit_pause(&self) -> Duration {
        Duration::from_millis(self.rate_limit_pause_ms)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_seconds.map(Duration::from_secs)
    }
}

impl NetworkConfig {
    /// Resolve the network record, applying any overrides
    pub fn params(&self) -> Result<NetworkParams, ConfigError> {
        let mut params = NetworkParams::for_network(self.network);

        if let Some(version_byte) = self.version_byte {
            params.version_byte = version_byte;
        }
        if let Some(contract) = &self.token_contract {
            params = params.with_token_contract(contract)?;
        }
        if let Some(symbol) = &self.token_symbol {
            params.token_symbol = symbol.clone();
        }
        if let Some(signature) = &self.transfer_event_signature {
            let normalized = crate::codec::normalize_hex(signature);
            if normalized.len() != 64 || !normalized.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(ConfigError::InvalidValue {
                    key: "network.transfer_event_signature".to_string(),
                    value: signature.clone(),
                });
            }
            params.transfer_event_signature = normalized;
        }

        Ok(params)
    }
}

fn parse_env<T: FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

impl AppConfig {
    /// Load configuration from file and environment variables.
    /// Environment variables take precedence over file values.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from(&config_path)
    }

    /// Same as [`AppConfig::load`] with an explicit file path
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file; a missing file yields defaults
    pub fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        if !Path::new(path).exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound(path.to_string()))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parsing(e.to_string()))
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        // API
        if let Ok(endpoint) = env::var("TRONGRID_API_URL") {
            self.api.endpoint = Some(endpoint);
        }
        if let Ok(api_key) = env::var("TRONGRID_API_KEY") {
            self.api.api_key = Some(api_key);
        }
        if let Ok(timeout) = env::var("TRONGRID_TIMEOUT_SECONDS") {
            self.api.timeout_seconds = parse_env("TRONGRID_TIMEOUT_SECONDS", timeout)?;
        }

        // Network
        if let Ok(network) = env::var("TRON_NETWORK") {
            self.network.network = network.parse()?;
        }

        // Watcher
        if let Ok(interval) = env::var("WATCHER_POLL_INTERVAL_MS") {
            self.watcher.poll_interval_ms = parse_env("WATCHER_POLL_INTERVAL_MS", interval)?;
        }
        if let Ok(cap) = env::var("WATCHER_BATCH_CAP") {
            self.watcher.catch_up_batch_cap = parse_env("WATCHER_BATCH_CAP", cap)?;
        }
        if let Ok(batch) = env::var("WATCHER_RATE_LIMIT_BATCH") {
            self.watcher.rate_limit_batch = parse_env("WATCHER_RATE_LIMIT_BATCH", batch)?;
        }
        if let Ok(pause) = env::var("WATCHER_RATE_LIMIT_PAUSE_MS") {
            self.watcher.rate_limit_pause_ms = parse_env("WATCHER_RATE_LIMIT_PAUSE_MS", pause)?;
        }

        // Cursor
        if let Ok(path) = env::var("CURSOR_DB_PATH") {
            self.cursor.path = path;
        }

        // Logging
        if let Ok(level) = env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = env::var("LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(endpoint) = &self.api.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(ConfigError::InvalidUrl(endpoint.clone()));
            }
        }

        if self.api.timeout_seconds == 0 || self.api.timeout_seconds > 300 {
            return Err(ConfigError::InvalidValue {
                key: "api.timeout_seconds".to_string(),
                value: self.api.timeout_seconds.to_string(),
            });
        }

        if self.api.max_retries == 0 || self.api.max_retries > 20 {
            return Err(ConfigError::InvalidValue {
                key: "api.max_retries".to_string(),
                value: self.api.max_retries.to_string(),
            });
        }

        if self.watcher.poll_interval_ms == 0 || self.watcher.poll_interval_ms > 300_000 {
            return Err(ConfigError::InvalidValue {
                key: "watcher.poll_interval_ms".to_string(),
                value: self.watcher.poll_interval_ms.to_string(),
            });
        }

        if self.watcher.rate_limit_batch == 0 {
            return Err(ConfigError::InvalidValue {
                key: "watcher.rate_limit_batch".to_string(),
                value: self.watcher.rate_limit_batch.to_string(),
            });
        }

        if self.watcher.channel_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "watcher.channel_capacity".to_string(),
                value: self.watcher.channel_capacity.to_string(),
            });
        }

        // Token contract and event signature overrides
        self.network.params()?;

        if self.cursor.path.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "cursor.path".to_string(),
                value: self.cursor.path.clone(),
            });
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "logging.level".to_string(),
                value: self.logging.level.clone(),
            });
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "logging.format".to_string(),
                value: self.logging.format.clone(),
            });
        }

        Ok(())
    }

    /// Base URL of the ledger API after applying the endpoint override
    pub fn api_base_url(&self) -> Result<String, ConfigError> {
        match &self.api.endpoint {
            Some(endpoint) => Ok(endpoint.clone()),
            None => Ok(self.network.params()?.api_base_url),
        }
    }

    /// Generate a sample configuration file
    pub fn generate_sample_config() -> Result<String, ConfigError> {
        toml::to_string_pretty(&Self::default()).map_err(|e| ConfigError::Parsing(e.to_string()))
    }
}
