//! Configuration for the TACT data source

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{DataSourceError, Result};

/// CDN path used when none is configured
pub const DEFAULT_CDN_PATH: &str = "tpr/wow";

/// HTTP client settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Connection timeout
    pub connect_timeout: Duration,

    /// Whole-request timeout, including the body
    pub request_timeout: Duration,

    /// How long idle connections stay pooled
    pub pool_idle_timeout: Duration,

    /// Idle connections kept per host
    pub max_idle_per_host: usize,

    /// User-Agent header
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(300),
            pool_idle_timeout: Duration::from_secs(90),
            max_idle_per_host: 8,
            user_agent: concat!("cascette-datasource/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl TransportConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            connect_timeout: env_secs("CASCETTE_CONNECT_TIMEOUT").unwrap_or(defaults.connect_timeout),
            request_timeout: env_secs("CASCETTE_REQUEST_TIMEOUT").unwrap_or(defaults.request_timeout),
            ..defaults
        }
    }
}

/// Everything needed to build a [`TactDataSource`](crate::TactDataSource)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceConfig {
    /// Mirror hosts, tried in order
    pub hosts: Vec<String>,

    /// CDN path segment, e.g. `tpr/wow`
    pub cdn_path: String,

    /// Game install whose `Data/indices` holds archive indexes
    pub install_path: Option<PathBuf>,

    /// Root of the local cache
    pub cache_dir: PathBuf,

    /// Archive index hashes to search, in enumeration order
    pub index_hashes: Vec<String>,

    /// Keep files that fail verification instead of deleting them
    pub preserve_failed_extractions: bool,

    /// HTTP client settings
    pub transport: TransportConfig,
}

impl Default for DataSourceConfig {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            cdn_path: DEFAULT_CDN_PATH.to_string(),
            install_path: None,
            cache_dir: PathBuf::from("cache"),
            index_hashes: Vec::new(),
            preserve_failed_extractions: false,
            transport: TransportConfig::default(),
        }
    }
}

impl DataSourceConfig {
    /// Create configuration from environment variables.
    ///
    /// Index hashes are not read from the environment.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            hosts: std::env::var("CASCETTE_CDN_HOSTS")
                .map(|hosts| parse_host_list(&hosts))
                .unwrap_or_default(),
            cdn_path: std::env::var("CASCETTE_CDN_PATH").unwrap_or(defaults.cdn_path),
            install_path: std::env::var("CASCETTE_INSTALL_PATH").map(PathBuf::from).ok(),
            cache_dir: std::env::var("CASCETTE_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            index_hashes: Vec::new(),
            preserve_failed_extractions: std::env::var("CASCETTE_PRESERVE_FAILED")
                .ok()
                .is_some_and(|value| parse_flag(&value)),
            transport: TransportConfig::from_env(),
        }
    }

    /// Load configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        serde_json::from_slice(&data).map_err(|e| {
            DataSourceError::Config(format!("{}: {e}", path.as_ref().display()))
        })
    }

    /// Check the configuration can drive a data source
    pub fn validate(&self) -> Result<()> {
        if self.hosts.iter().all(|host| host.trim().is_empty()) {
            return Err(DataSourceError::Config("no CDN hosts configured".to_string()));
        }
        if self.cdn_path.trim_matches('/').is_empty() {
            return Err(DataSourceError::Config("CDN path is empty".to_string()));
        }
        if let Some(bad) = self.index_hashes.iter().find(|hash| !is_hex_hash(hash)) {
            return Err(DataSourceError::Config(format!(
                "index hash {bad:?} is not 32 hex characters"
            )));
        }
        Ok(())
    }
}

/// Split a host list on commas and whitespace
pub fn parse_host_list(value: &str) -> Vec<String> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|host| !host.is_empty())
        .map(str::to_string)
        .collect()
}

/// 32 hex digits, the textual form of a 16-byte hash
pub fn is_hex_hash(value: &str) -> bool {
    value.len() == 32 && value.bytes().all(|b| b.is_ascii_hexdigit())
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn env_secs(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .map(Duration::from_secs)
}
