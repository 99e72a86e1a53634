//! File configuration
//!
//! YAML configuration mirroring the deployment shape:
//!
//! ```yaml
//! log_level: info
//! http:
//!   port: 4200
//!   domain: https://requests.example.dev
//!   max_request_body_size: 2048
//!   database:
//!     driver: postgres
//!     dsn: postgres://localhost/reqsink
//! cron:
//!   ttl: 24h
//!   soft_deletes: true
//! hub:
//!   per_topic_capacity: 64
//!   idle_topic_timeout: 60s
//!   cleanup_interval: 30s
//! ```
//!
//! Every section and field is optional; absent values take the defaults
//! below.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::hub::HubConfig;
use crate::server::ServerConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read configuration file")]
    Io(#[from] std::io::Error),

    #[error("could not parse configuration file")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub log_level: LogLevel,
    pub http: HttpConfig,
    pub cron: CronConfig,
    pub hub: HubSection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    pub port: u16,
    pub domain: String,
    pub max_request_body_size: u64,
    pub database: DatabaseConfig,
}

impl Default for HttpConfig {
    fn default() -> Self {
        let server = ServerConfig::default();
        Self {
            port: server.port,
            domain: server.domain,
            max_request_body_size: server.max_request_body_size,
            database: DatabaseConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub driver: Driver,
    pub dsn: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: Driver::Memory,
            dsn: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    Postgres,
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CronConfig {
    /// Age past which captured requests are purged.
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,

    /// Mark records deleted instead of removing the rows.
    pub soft_deletes: bool,
}

impl Default for CronConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(24 * 60 * 60),
            soft_deletes: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HubSection {
    pub per_topic_capacity: usize,

    #[serde(with = "humantime_serde")]
    pub idle_topic_timeout: Duration,

    #[serde(with = "humantime_serde")]
    pub cleanup_interval: Duration,
}

impl Default for HubSection {
    fn default() -> Self {
        let config = HubConfig::default();
        Self {
            per_topic_capacity: config.per_topic_capacity,
            idle_topic_timeout: config.idle_topic_timeout,
            cleanup_interval: config.cleanup_interval,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&raw)?)
    }

    /// The HTTP layer's view of this configuration.
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig::default()
            .port(self.http.port)
            .domain(self.http.domain.clone())
            .max_request_body_size(self.http.max_request_body_size)
    }

    /// The hub's view of this configuration.
    pub fn hub_config(&self) -> HubConfig {
        HubConfig::default()
            .per_topic_capacity(self.hub.per_topic_capacity)
            .idle_topic_timeout(self.hub.idle_topic_timeout)
            .cleanup_interval(self.hub.cleanup_interval)
    }
}
