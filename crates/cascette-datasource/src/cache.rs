//! Local cache for downloaded index files

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::trace;

use crate::sink::FileSink;

/// Cache key of an archive index
pub fn index_cache_key(index_hash: &str) -> String {
    format!("data/{index_hash}.index")
}

/// Keyed file store backing the cache tier
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn exists(&self, key: &str) -> bool;

    /// Path the entry for `key` lives at, whether or not it exists
    fn full_path(&self, key: &str) -> PathBuf;

    /// Create or truncate the entry for `key` and return a sink writing it
    async fn open_for_write(&self, key: &str) -> std::io::Result<FileSink>;

    /// Remove the entry; a missing entry is not an error
    async fn delete(&self, key: &str) -> std::io::Result<()>;
}

/// Cache storing each key as a file below a root directory
#[derive(Debug, Clone)]
pub struct DiskCache {
    root: PathBuf,
}

impl DiskCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn checked_path(&self, key: &str) -> std::io::Result<PathBuf> {
        let relative = Path::new(key);
        let plain = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if key.is_empty() || !plain {
            return Err(std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("invalid cache key {key:?}"),
            ));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl CacheStore for DiskCache {
    async fn exists(&self, key: &str) -> bool {
        match self.checked_path(key) {
            Ok(path) => tokio::fs::metadata(&path)
                .await
                .is_ok_and(|meta| meta.is_file()),
            Err(_) => false,
        }
    }

    fn full_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    async fn open_for_write(&self, key: &str) -> std::io::Result<FileSink> {
        let path = self.checked_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        trace!("Opening cache slot {}", path.display());
        FileSink::create(&path).await
    }

    async fn delete(&self, key: &str) -> std::io::Result<()> {
        let path = self.checked_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}
