//! Configuration management.

use serde::Deserialize;

/// Main application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Redis configuration
    #[serde(default)]
    pub redis: RedisConfig,

    /// Upload storage configuration
    #[serde(default)]
    pub upload: UploadConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Directory where uploaded files are stored
    #[serde(default = "default_upload_dir")]
    pub dir: String,

    /// Maximum accepted file size in bytes
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: default_upload_dir(),
            max_file_size: default_max_file_size(),
        }
    }
}

/// Which store backs the rate limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitBackendKind {
    Memory,
    Redis,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSettings {
    /// Whether the global request limiter is enabled
    #[serde(default = "default_rate_limit_enabled")]
    pub enabled: bool,

    /// Which backend stores request timestamps
    #[serde(default = "default_rate_limit_backend")]
    pub backend: RateLimitBackendKind,

    /// Global per-client request budget per window
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,

    /// Sliding window length for the global limiter, in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Stricter budget applied to evaluation submission
    #[serde(default = "default_evaluate_limit")]
    pub evaluate_limit: u32,

    /// Window for the evaluation submission budget, in seconds
    #[serde(default = "default_evaluate_window_secs")]
    pub evaluate_window_secs: u64,

    /// Path prefixes that bypass rate limiting entirely
    #[serde(default = "default_exclude_paths")]
    pub exclude_paths: Vec<String>,

    /// On store outage: true forwards requests unchecked, false returns 503
    #[serde(default = "default_fail_open")]
    pub fail_open: bool,

    /// Interval for the in-memory backend's expired-key sweep, in seconds
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: default_rate_limit_enabled(),
            backend: default_rate_limit_backend(),
            requests_per_minute: default_requests_per_minute(),
            window_secs: default_window_secs(),
            evaluate_limit: default_evaluate_limit(),
            evaluate_window_secs: default_evaluate_window_secs(),
            exclude_paths: default_exclude_paths(),
            fail_open: default_fail_open(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON logs instead of human-readable output
    #[serde(default = "default_json_logging")]
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: default_json_logging(),
        }
    }
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 5 }
fn default_redis_url() -> String { "redis://localhost:6379".to_string() }
fn default_upload_dir() -> String { "uploads".to_string() }
fn default_max_file_size() -> u64 { 10 * 1024 * 1024 }
fn default_rate_limit_enabled() -> bool { true }
fn default_rate_limit_backend() -> RateLimitBackendKind { RateLimitBackendKind::Memory }
fn default_requests_per_minute() -> u32 { 60 }
fn default_window_secs() -> u64 { 60 }
fn default_evaluate_limit() -> u32 { 10 }
fn default_evaluate_window_secs() -> u64 { 60 }
fn default_exclude_paths() -> Vec<String> {
    vec![
        "/health".to_string(),
        "/metrics".to_string(),
        "/docs".to_string(),
    ]
}
fn default_fail_open() -> bool { true }
fn default_cleanup_interval_secs() -> u64 { 300 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }

impl Config {
    /// Load configuration from environment and config files.
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("SIFT").separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }

    /// Load from a config file, with environment variables taking precedence.
    /// The server reads the path from `SIFT_CONFIG`.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("SIFT").separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }
}
