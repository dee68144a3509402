//! CDN URL construction

use crate::error::{DataSourceError, Result};

/// Suffix of archive index objects
pub const INDEX_SUFFIX: &str = ".index";

/// URL of an object under the CDN `data` directory.
///
/// Objects are sharded by the first two pairs of hex digits:
/// `{scheme}://{host}/{cdn_path}/data/{ab}/{cd}/{abcd...}{suffix}`. A host
/// without a scheme is reached over plain HTTP.
pub fn data_url(host: &str, cdn_path: &str, hash: &str, suffix: &str) -> Result<String> {
    if hash.len() < 4 || !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(DataSourceError::InvalidHash(hash.to_string()));
    }
    let hash = hash.to_ascii_lowercase();
    let host = host.trim_end_matches('/');
    let cdn_path = cdn_path.trim_matches('/');

    let base = if host.contains("://") {
        host.to_string()
    } else {
        format!("http://{host}")
    };

    Ok(format!(
        "{}/{}/data/{}/{}/{}{}",
        base,
        cdn_path,
        &hash[..2],
        &hash[2..4],
        hash,
        suffix
    ))
}

/// URL of an archive index
pub fn index_url(host: &str, cdn_path: &str, index_hash: &str) -> Result<String> {
    data_url(host, cdn_path, index_hash, INDEX_SUFFIX)
}

/// Ordered mirror hosts sharing one CDN path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mirrors {
    hosts: Vec<String>,
    cdn_path: String,
}

impl Mirrors {
    pub fn new(hosts: Vec<String>, cdn_path: impl Into<String>) -> Self {
        Self {
            hosts,
            cdn_path: cdn_path.into(),
        }
    }

    /// Hosts in the order they are tried
    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    pub fn cdn_path(&self) -> &str {
        &self.cdn_path
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// URL of a data object on `host`
    pub fn data_url(&self, host: &str, hash: &str) -> Result<String> {
        data_url(host, &self.cdn_path, hash, "")
    }

    /// URL of an archive index on `host`
    pub fn index_url(&self, host: &str, index_hash: &str) -> Result<String> {
        index_url(host, &self.cdn_path, index_hash)
    }
}
