//! Command-line arguments of `cascette-extract`
//!
//! Every setting can also come from the environment, using the same
//! variables as [`DataSourceConfig::from_env`].

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{DEFAULT_CDN_PATH, DataSourceConfig, TransportConfig};
use crate::error::Result;
use crate::source::{ExtractOptions, decode_content_hash, decode_key};

/// Extract one file from CDN archives by encoding key
#[derive(Debug, Clone, Parser)]
#[command(
    name = "cascette-extract",
    about = "Extract a file from TACT CDN archives by encoding key",
    version
)]
pub struct ExtractArgs {
    /// CDN mirror host, tried in the order given (repeatable or comma separated)
    #[arg(
        long = "host",
        env = "CASCETTE_CDN_HOSTS",
        value_delimiter = ',',
        required = true
    )]
    pub hosts: Vec<String>,

    /// CDN path segment
    #[arg(long, env = "CASCETTE_CDN_PATH", default_value = DEFAULT_CDN_PATH)]
    pub cdn_path: String,

    /// Directory for downloaded indexes
    #[arg(long, env = "CASCETTE_CACHE_DIR", default_value = "cache")]
    pub cache_dir: PathBuf,

    /// Game install containing Data/indices
    #[arg(long, env = "CASCETTE_INSTALL_PATH")]
    pub install_path: Option<PathBuf>,

    /// Archive index hash to search (repeatable or comma separated)
    #[arg(long = "index", value_delimiter = ',')]
    pub indexes: Vec<String>,

    /// Expected MD5 of the extracted file
    #[arg(long)]
    pub content_hash: Option<String>,

    /// Keep the output file when verification fails
    #[arg(long)]
    pub keep_failed: bool,

    /// Connection timeout in seconds
    #[arg(long, env = "CASCETTE_CONNECT_TIMEOUT", default_value_t = 10)]
    pub connect_timeout: u64,

    /// Request timeout in seconds
    #[arg(long, env = "CASCETTE_REQUEST_TIMEOUT", default_value_t = 300)]
    pub request_timeout: u64,

    /// Encoding key of the content (hex)
    pub encoding_key: String,

    /// Output file
    pub output: PathBuf,
}

impl ExtractArgs {
    /// Parse arguments from the process command line
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Data source configuration described by these arguments
    pub fn to_config(&self) -> Result<DataSourceConfig> {
        let config = DataSourceConfig {
            hosts: self.hosts.clone(),
            cdn_path: self.cdn_path.clone(),
            install_path: self.install_path.clone(),
            cache_dir: self.cache_dir.clone(),
            index_hashes: self.indexes.iter().map(|i| i.to_ascii_lowercase()).collect(),
            preserve_failed_extractions: self.keep_failed,
            transport: TransportConfig {
                connect_timeout: Duration::from_secs(self.connect_timeout),
                request_timeout: Duration::from_secs(self.request_timeout),
                ..TransportConfig::default()
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Decoded encoding key
    pub fn key(&self) -> Result<Vec<u8>> {
        decode_key(&self.encoding_key)
    }

    /// Decoded expected content hash, if one was given
    pub fn expected_hash(&self) -> Result<Option<[u8; 16]>> {
        self.content_hash.as_deref().map(decode_content_hash).transpose()
    }

    pub fn options(&self) -> ExtractOptions {
        ExtractOptions {
            preserve_failed: self.keep_failed,
        }
    }
}
