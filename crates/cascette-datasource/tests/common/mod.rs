//! Shared helpers for integration tests

#![allow(dead_code)]
#![allow(clippy::expect_used)]

#[path = "../../src/test_utils.rs"]
pub mod fixtures;

use cascette_datasource::DataSourceConfig;
use std::path::Path;
use wiremock::MockServer;

pub const CDN_PATH: &str = "tpr/wow";

/// Request path of a data object on a mock CDN
pub fn data_path(hash: &str, suffix: &str) -> String {
    format!("/{CDN_PATH}/data/{}/{}/{hash}{suffix}", &hash[..2], &hash[2..4])
}

pub fn index_path(hash: &str) -> String {
    data_path(hash, ".index")
}

/// Configuration pointing at mock CDN servers
pub fn config(servers: &[&MockServer], cache_dir: &Path, indexes: &[&str]) -> DataSourceConfig {
    DataSourceConfig {
        hosts: servers.iter().map(|server| server.uri()).collect(),
        cdn_path: CDN_PATH.to_string(),
        cache_dir: cache_dir.to_path_buf(),
        index_hashes: indexes.iter().map(|hash| (*hash).to_string()).collect(),
        ..DataSourceConfig::default()
    }
}

/// Log to the test writer; honours `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
