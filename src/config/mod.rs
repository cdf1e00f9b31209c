//! Configuration management for order-sync
//!
//! This module handles loading, parsing, and validating application configuration
//! from YAML files and environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Customer whose order history is synchronized
    #[serde(default)]
    pub customer_id: String,

    /// Remote order API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Request budget
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Retry configuration
    #[serde(default)]
    pub retry: RetryConfig,

    /// Order catalog paging
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Persistence configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileRead(format!("Failed to read config file: {}", e)))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(yaml);
        serde_yaml::from_str(&expanded)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse YAML: {}", e)))
    }

    /// Load configuration from environment variables with prefix ORDER_SYNC_
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Ok(customer_id) = std::env::var("ORDER_SYNC_CUSTOMER_ID") {
            config.customer_id = customer_id;
        }
        if let Ok(base_url) = std::env::var("ORDER_SYNC_API_BASE_URL") {
            config.api.base_url = base_url;
        }
        if let Ok(token) = std::env::var("ORDER_SYNC_API_TOKEN") {
            config.api.token = Some(token);
        }
        if let Ok(max) = std::env::var("ORDER_SYNC_RATE_LIMIT_MAX_PER_WINDOW") {
            config.rate_limit.max_per_window = max.parse().map_err(|_| {
                ConfigError::Parse("Invalid ORDER_SYNC_RATE_LIMIT_MAX_PER_WINDOW".to_string())
            })?;
        }
        if let Ok(dir) = std::env::var("ORDER_SYNC_DATA_DIR") {
            config.storage.data_dir = dir;
        }
        if let Ok(level) = std::env::var("ORDER_SYNC_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(format) = std::env::var("ORDER_SYNC_LOG_FORMAT") {
            config.logging.format = format;
        }

        Ok(config)
    }

    /// Check values that would make the engine misbehave
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.customer_id.trim().is_empty() {
            return Err(ConfigError::MissingRequired("customer_id".to_string()));
        }
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::MissingRequired("api.base_url".to_string()));
        }
        if self.rate_limit.max_per_window == 0 {
            return Err(ConfigError::InvalidValue(
                "rate_limit.max_per_window must be at least 1".to_string(),
            ));
        }
        if self.rate_limit.window_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "rate_limit.window_secs must be at least 1".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.retry.backoff_factor < 1.0 {
            return Err(ConfigError::InvalidValue(
                "retry.backoff_factor must be >= 1.0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Remote order API configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    /// Base URL, e.g. `https://orders.example.com/api`
    #[serde(default)]
    pub base_url: String,

    /// Bearer token sent with every request
    #[serde(default)]
    pub token: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token: None,
            timeout_secs: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

/// Sliding-window request budget
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateLimitConfig {
    /// Maximum grants in any trailing window
    #[serde(default = "default_max_per_window")]
    pub max_per_window: usize,

    /// Window length in seconds
    #[serde(default = "default_window")]
    pub window_secs: u64,

    /// Minimum interval between consecutive grants in milliseconds
    #[serde(default = "default_min_spacing")]
    pub min_spacing_ms: u64,
}

impl RateLimitConfig {
    /// Window as a `Duration`
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Minimum spacing as a `Duration`
    pub fn min_spacing(&self) -> Duration {
        Duration::from_millis(self.min_spacing_ms)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_per_window: default_max_per_window(),
            window_secs: default_window(),
            min_spacing_ms: default_min_spacing(),
        }
    }
}

fn default_max_per_window() -> usize {
    60
}

fn default_window() -> u64 {
    60
}

fn default_min_spacing() -> u64 {
    1000
}

/// Retry configuration for remote calls
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay after the first failed attempt in milliseconds
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Upper bound for any single delay in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Backoff multiplier
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,

    /// Whether to add jitter to backoff
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            backoff_factor: default_backoff_factor(),
            jitter: false,
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> u64 {
    1000
}

fn default_max_delay() -> u64 {
    30_000
}

fn default_backoff_factor() -> f64 {
    2.0
}

/// Order catalog paging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogConfig {
    /// Pages fetched before the cursor chain is considered runaway
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
        }
    }
}

fn default_max_pages() -> usize {
    500
}

/// Persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// Directory holding the state files
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> String {
    "./data".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// Configuration error types
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ConfigError {
    /// Error reading configuration file
    #[error("Failed to read configuration file: {0}")]
    FileRead(String),

    /// Error parsing configuration
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// Invalid configuration value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// Missing required configuration
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

/// Expand environment variables in a string
///
/// Supports `${VAR_NAME}` syntax
fn expand_env_vars(input: &str) -> String {
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .expect("Invalid regex pattern for environment variable expansion");

    re.replace_all(input, |caps: &regex_lite::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}
