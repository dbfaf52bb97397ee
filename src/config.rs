//! Service configuration loading and validation
//!
//! [`Config`] is read from an optional TOML file. Every section and field has a
//! default, so an empty file (or no file at all) yields a working local setup:
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:8000"
//!
//! [upstream]
//! base_url = "https://api.spacexdata.com/v4/"
//! timeout_secs = 10
//!
//! [store]
//! backend = "sqlite"        # or "memory"
//! path = "launches.db"
//!
//! [cache]
//! backend = "redis"         # or "memory", "file"
//! ttl_secs = 3600
//! redis_url = "redis://127.0.0.1:6379/0"
//! timeout_ms = 2000
//!
//! [refresh]
//! enabled = true
//! interval_secs = 300
//!
//! [logging]
//! level = "info"
//! format = "pretty"         # or "json"
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;
use tracing_subscriber::{fmt, EnvFilter};

use crate::data::spacex::{DEFAULT_FETCH_TIMEOUT, SPACEX_BASE_URL};
use crate::refresh::RefreshConfig;

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Top-level service configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub store: StoreConfig,
    pub cache: CacheConfig,
    pub refresh: RefreshSettings,
    pub logging: LoggingConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".into(),
        }
    }
}

/// Upstream API settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: SPACEX_BASE_URL.into(),
            timeout_secs: DEFAULT_FETCH_TIMEOUT.as_secs(),
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Which document store implementation to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Memory,
}

/// Persistent store settings
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Database file; defaults to the platform data directory
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    /// Resolves the database file location
    pub fn resolved_path(&self) -> PathBuf {
        if let Some(path) = &self.path {
            return path.clone();
        }
        ProjectDirs::from("", "", "launchtrack")
            .map(|dirs| dirs.data_dir().join("launches.db"))
            .unwrap_or_else(|| PathBuf::from("launches.db"))
    }
}

/// Which cache backend to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    #[default]
    Memory,
    File,
    Redis,
}

/// Read-through cache settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackendKind,
    /// Lifetime of cached query results
    pub ttl_secs: u64,
    pub redis_url: String,
    /// Directory for the file backend; defaults to the platform cache directory
    pub dir: Option<PathBuf>,
    /// Bound on each backend call
    pub timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::Memory,
            ttl_secs: 3600,
            redis_url: "redis://127.0.0.1:6379/0".into(),
            dir: None,
            timeout_ms: 2000,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Scheduled refresh settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RefreshSettings {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        let defaults = RefreshConfig::default();
        Self {
            enabled: defaults.enabled,
            interval_secs: defaults.interval.as_secs(),
        }
    }
}

impl From<&RefreshSettings> for RefreshConfig {
    fn from(settings: &RefreshSettings) -> Self {
        RefreshConfig {
            interval: Duration::from_secs(settings.interval_secs),
            enabled: settings.enabled,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

impl LoggingConfig {
    /// Installs the global tracing subscriber
    ///
    /// `RUST_LOG` takes precedence over the configured level.
    pub fn init(&self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        match self.format.as_str() {
            "json" => {
                fmt().json().with_env_filter(filter).init();
            }
            _ => {
                fmt().with_env_filter(filter).init();
            }
        }
    }
}

impl Config {
    /// Parses and validates configuration from TOML text
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, the TOML is malformed or a
    /// value is out of range.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Parsed listen address
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server
            .bind
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::InvalidValue {
                field: "server.bind",
                reason: e.to_string(),
            })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;

        let positive = [
            ("upstream.timeout_secs", self.upstream.timeout_secs),
            ("cache.ttl_secs", self.cache.ttl_secs),
            ("cache.timeout_ms", self.cache.timeout_ms),
            ("refresh.interval_secs", self.refresh.interval_secs),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "must be greater than 0".to_string(),
                });
            }
        }

        if self.upstream.base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "upstream.base_url",
                reason: "must not be empty".to_string(),
            });
        }

        Ok(())
    }

    pub fn init_logging(&self) {
        self.logging.init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::parse_toml("").unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.server.bind, "127.0.0.1:8000");
        assert_eq!(config.upstream.timeout(), Duration::from_secs(10));
        assert_eq!(config.cache.ttl(), Duration::from_secs(3600));
        assert_eq!(config.cache.timeout(), Duration::from_secs(2));
        assert_eq!(config.refresh.interval_secs, 300);
        assert!(config.refresh.enabled);
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.cache.backend, CacheBackendKind::Memory);
    }

    #[test]
    fn test_sections_override_defaults() {
        let config = Config::parse_toml(
            r#"
            [server]
            bind = "0.0.0.0:9000"

            [store]
            backend = "memory"

            [cache]
            backend = "redis"
            ttl_secs = 60
            redis_url = "redis://cache:6379/1"

            [refresh]
            enabled = false

            [logging]
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.bind_addr().unwrap().port(), 9000);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.cache.backend, CacheBackendKind::Redis);
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.cache.redis_url, "redis://cache:6379/1");
        assert_eq!(config.cache.timeout_ms, 2000);
        assert!(!config.refresh.enabled);
        assert_eq!(config.refresh.interval_secs, 300);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_refresh_settings_convert_to_scheduler_config() {
        let settings = RefreshSettings {
            enabled: true,
            interval_secs: 42,
        };
        let config = RefreshConfig::from(&settings);

        assert_eq!(config.interval, Duration::from_secs(42));
        assert!(config.enabled);
    }

    #[test]
    fn test_invalid_bind_is_rejected() {
        let err = Config::parse_toml("[server]\nbind = \"not an address\"").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "server.bind", .. }));
    }

    #[test]
    fn test_zero_ttl_is_rejected() {
        let err = Config::parse_toml("[cache]\nttl_secs = 0").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "cache.ttl_secs", .. }));
    }

    #[test]
    fn test_unknown_backend_is_a_parse_error() {
        let err = Config::parse_toml("[store]\nbackend = \"mongo\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_reads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("launchtrack.toml");
        std::fs::write(&path, "[store]\npath = \"/tmp/x.db\"").unwrap();

        let config = Config::load(&path).unwrap();

        assert_eq!(config.store.resolved_path(), PathBuf::from("/tmp/x.db"));
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile(_)));
    }
}
