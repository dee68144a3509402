//! Encoding key to archive location resolution
//!
//! The resolver owns an ordered list of archive indexes. Each index sits in
//! a tier decided once at construction: present in the game install,
//! present in the local cache, or not yet downloaded. Lookups walk indexes
//! install first, cache second, unresolved last, so an index that exists
//! locally never causes a download. Unresolved indexes are fetched into the
//! cache on demand and promoted.
//!
//! When no index holds the key, every mirror is asked with a HEAD request
//! whether the key exists as a loose object under the data path.

use dashmap::DashMap;
use parking_lot::RwLock;
use reqwest::StatusCode;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

use crate::cache::{CacheStore, index_cache_key};
use crate::error::{DataSourceError, Result};
use crate::index::{IndexEntry, IndexHandle};
use crate::location::Location;
use crate::sink::ByteSink;
use crate::transport::{Transport, TransportError};
use crate::url::Mirrors;

/// Where an index is read from, in lookup priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexTier {
    /// `Data/indices` of the game install
    LocalInstall,
    /// Local cache
    Cache,
    /// Must be downloaded before use
    Unresolved,
    /// Failed to parse; skipped for the rest of the session
    Unusable,
}

impl fmt::Display for IndexTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LocalInstall => "install",
            Self::Cache => "cache",
            Self::Unresolved => "unresolved",
            Self::Unusable => "unusable",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    hash: String,
    tier: IndexTier,
}

/// Directory holding the install's archive indexes, if the install has one
pub fn install_index_dir(install_path: &Path) -> Option<PathBuf> {
    let dir = install_path.join("Data").join("indices");
    if dir.is_dir() {
        Some(dir)
    } else {
        warn!(
            "Install path {} has no Data/indices directory, ignoring installed indexes",
            install_path.display()
        );
        None
    }
}

/// Resolves encoding keys to archive locations
pub struct IndexResolver {
    mirrors: Mirrors,
    install_dir: Option<PathBuf>,
    cache: Arc<dyn CacheStore>,
    transport: Arc<dyn Transport>,
    candidates: RwLock<Vec<Candidate>>,
    parsed: DashMap<String, Arc<OnceCell<Arc<IndexHandle>>>>,
    parses: AtomicUsize,
    fetch_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl fmt::Debug for IndexResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexResolver")
            .field("mirrors", &self.mirrors)
            .field("install_dir", &self.install_dir)
            .field("candidates", &self.candidates.read().len())
            .field("parsed", &self.parsed.len())
            .finish_non_exhaustive()
    }
}

impl IndexResolver {
    /// Probe where each index lives and order them by tier.
    ///
    /// Duplicate hashes are dropped; within a tier the given order is kept.
    pub async fn new(
        mirrors: Mirrors,
        install_path: Option<&Path>,
        index_hashes: &[String],
        cache: Arc<dyn CacheStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let install_dir = install_path.and_then(install_index_dir);

        let mut candidates: Vec<Candidate> = Vec::with_capacity(index_hashes.len());
        for hash in index_hashes {
            let hash = hash.to_ascii_lowercase();
            if candidates.iter().any(|c| c.hash == hash) {
                continue;
            }

            let installed = match &install_dir {
                Some(dir) => tokio::fs::metadata(dir.join(format!("{hash}.index")))
                    .await
                    .is_ok_and(|meta| meta.is_file()),
                None => false,
            };
            let tier = if installed {
                IndexTier::LocalInstall
            } else if cache.exists(&index_cache_key(&hash)).await {
                IndexTier::Cache
            } else {
                IndexTier::Unresolved
            };
            candidates.push(Candidate { hash, tier });
        }
        candidates.sort_by_key(|c| c.tier);

        debug!(
            "Index tiers: {} install, {} cache, {} unresolved",
            candidates.iter().filter(|c| c.tier == IndexTier::LocalInstall).count(),
            candidates.iter().filter(|c| c.tier == IndexTier::Cache).count(),
            candidates.iter().filter(|c| c.tier == IndexTier::Unresolved).count(),
        );

        Self {
            mirrors,
            install_dir,
            cache,
            transport,
            candidates: RwLock::new(candidates),
            parsed: DashMap::new(),
            parses: AtomicUsize::new(0),
            fetch_locks: DashMap::new(),
        }
    }

    /// Snapshot of `(index hash, tier)` in lookup order
    pub fn tiers(&self) -> Vec<(String, IndexTier)> {
        self.candidates
            .read()
            .iter()
            .map(|c| (c.hash.clone(), c.tier))
            .collect()
    }

    pub fn mirrors(&self) -> &Mirrors {
        &self.mirrors
    }

    /// Index files parsed so far, including failed parses
    pub fn index_parses(&self) -> usize {
        self.parses.load(Ordering::Relaxed)
    }

    fn set_tier(&self, hash: &str, tier: IndexTier) {
        if let Some(candidate) = self.candidates.write().iter_mut().find(|c| c.hash == hash) {
            candidate.tier = tier;
        }
    }

    fn index_path(&self, hash: &str, tier: IndexTier) -> Option<PathBuf> {
        match tier {
            IndexTier::LocalInstall => self
                .install_dir
                .as_ref()
                .map(|dir| dir.join(format!("{hash}.index"))),
            IndexTier::Cache => Some(self.cache.full_path(&index_cache_key(hash))),
            IndexTier::Unresolved | IndexTier::Unusable => None,
        }
    }

    /// Find where the content with encoding key `key` is stored.
    ///
    /// `Ok(None)` means no index holds the key and no mirror has it as a
    /// loose object.
    pub async fn resolve(&self, key: &[u8]) -> Result<Option<Location>> {
        if key.len() < 2 {
            return Err(DataSourceError::InvalidHash(hex::encode(key)));
        }

        for (hash, tier) in self.tiers() {
            let tier = match tier {
                IndexTier::Unusable => continue,
                IndexTier::Unresolved => match self.fetch_index(&hash).await {
                    Ok(()) => {
                        self.set_tier(&hash, IndexTier::Cache);
                        IndexTier::Cache
                    }
                    Err(e) => {
                        warn!("Skipping index {}: {}", hash, e);
                        continue;
                    }
                },
                tier => tier,
            };

            let Some(path) = self.index_path(&hash, tier) else {
                continue;
            };
            match self.search_index(&hash, path, key).await {
                Ok(Some(entry)) => {
                    debug!(
                        "Found {} in index {} ({}) at {} (+{})",
                        hex::encode(key),
                        hash,
                        tier,
                        entry.offset,
                        entry.length
                    );
                    return Ok(Some(Location::archived(
                        hash,
                        u64::from(entry.offset),
                        u64::from(entry.length),
                    )));
                }
                Ok(None) => {}
                Err(e) if e.is_format_error() => {
                    warn!("Index {} is unusable: {}", hash, e);
                    self.set_tier(&hash, IndexTier::Unusable);
                }
                Err(e) => warn!("Could not search index {}: {}", hash, e),
            }
        }

        self.probe_cdn(key).await
    }

    /// Parsed handle for `hash`, parsing at most once per resolver
    async fn handle(&self, hash: &str, path: PathBuf) -> Result<Arc<IndexHandle>> {
        let cell = self.parsed.entry(hash.to_string()).or_default().clone();
        let handle = cell
            .get_or_try_init(|| async move {
                self.parses.fetch_add(1, Ordering::Relaxed);
                let name = hash.to_string();
                let handle =
                    tokio::task::spawn_blocking(move || IndexHandle::open(&name, &path)).await??;
                Ok::<_, DataSourceError>(Arc::new(handle))
            })
            .await?;
        Ok(Arc::clone(handle))
    }

    async fn search_index(&self, hash: &str, path: PathBuf, key: &[u8]) -> Result<Option<IndexEntry>> {
        let handle = self.handle(hash, path).await?;
        let key = key.to_vec();
        let entry = tokio::task::spawn_blocking(move || handle.lookup(&key)).await??;
        Ok(entry)
    }

    /// Download an index into the cache.
    ///
    /// Only one download per index runs at a time; a caller that waited for
    /// another's download finds the cache filled and returns.
    async fn fetch_index(&self, hash: &str) -> Result<()> {
        let key = index_cache_key(hash);
        let lock = self.fetch_locks.entry(hash.to_string()).or_default().clone();
        let _guard = lock.lock().await;

        if self.cache.exists(&key).await {
            debug!("Index {} already cached", hash);
            return Ok(());
        }

        for host in self.mirrors.hosts() {
            let url = self.mirrors.index_url(host, hash)?;
            let mut slot = self
                .cache
                .open_for_write(&key)
                .await
                .map_err(|source| DataSourceError::CacheSlot {
                    key: key.clone(),
                    source,
                })?;

            let outcome = match self.transport.get(&url, &mut slot, None).await {
                Ok(bytes) => slot
                    .finish()
                    .await
                    .map(|()| bytes)
                    .map_err(TransportError::from),
                Err(e) => Err(e),
            };
            drop(slot);

            match outcome {
                Ok(bytes) => {
                    info!("Fetched index {} from {} ({} bytes)", hash, host, bytes);
                    return Ok(());
                }
                Err(e) => {
                    warn!("Index {} download from {} failed: {}", hash, host, e);
                    if let Err(e) = self.cache.delete(&key).await {
                        warn!("Could not discard partial index {}: {}", key, e);
                    }
                }
            }
        }

        Err(DataSourceError::AllHostsFailed {
            what: format!("index {hash}"),
            hosts: self.mirrors.len(),
        })
    }

    /// Ask each mirror whether `key` exists as a loose data object
    async fn probe_cdn(&self, key: &[u8]) -> Result<Option<Location>> {
        let hash = hex::encode(key);
        for host in self.mirrors.hosts() {
            let url = self.mirrors.data_url(host, &hash)?;
            match self.transport.head(&url).await {
                Ok(StatusCode::OK) => {
                    debug!("Found {} as a loose object on {}", hash, host);
                    return Ok(Some(Location::whole(hash)));
                }
                Ok(status) => debug!("HEAD {} -> {}", url, status),
                Err(e) => warn!("HEAD {} failed: {}", url, e),
            }
        }
        debug!("{} not found in any index or on any host", hash);
        Ok(None)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::cache::DiskCache;
    use crate::test_utils::{build_index, key};
    use crate::transport::{ByteRange, TransportResult};
    use async_trait::async_trait;
    use tempfile::TempDir;

    /// Transport that serves nothing and counts calls
    #[derive(Default)]
    struct OfflineTransport {
        gets: AtomicUsize,
        heads: AtomicUsize,
    }

    #[async_trait]
    impl Transport for OfflineTransport {
        async fn get(
            &self,
            _url: &str,
            _sink: &mut (dyn ByteSink + Send),
            _range: Option<ByteRange>,
        ) -> TransportResult<u64> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            Err(TransportError::Status(StatusCode::NOT_FOUND))
        }

        async fn head(&self, _url: &str) -> TransportResult<StatusCode> {
            self.heads.fetch_add(1, Ordering::SeqCst);
            Ok(StatusCode::NOT_FOUND)
        }
    }

    /// Breaks off the first `failures` GETs after half the body, then
    /// serves the full body
    struct FlakyTransport {
        body: Vec<u8>,
        failures: usize,
        gets: AtomicUsize,
    }

    #[async_trait]
    impl Transport for FlakyTransport {
        async fn get(
            &self,
            _url: &str,
            sink: &mut (dyn ByteSink + Send),
            _range: Option<ByteRange>,
        ) -> TransportResult<u64> {
            let attempt = self.gets.fetch_add(1, Ordering::SeqCst);
            if attempt < self.failures {
                sink.write(&self.body[..self.body.len() / 2]).await?;
                return Err(TransportError::Status(StatusCode::BAD_GATEWAY));
            }
            sink.write(&self.body).await?;
            Ok(self.body.len() as u64)
        }

        async fn head(&self, _url: &str) -> TransportResult<StatusCode> {
            Ok(StatusCode::NOT_FOUND)
        }
    }

    struct Layout {
        _dir: TempDir,
        install: PathBuf,
        cache: Arc<DiskCache>,
    }

    fn layout() -> Layout {
        let dir = TempDir::new().expect("Operation should succeed");
        let install = dir.path().join("wow");
        std::fs::create_dir_all(install.join("Data").join("indices"))
            .expect("Operation should succeed");
        let cache = Arc::new(DiskCache::new(dir.path().join("cache")));
        Layout {
            _dir: dir,
            install,
            cache,
        }
    }

    fn put_installed(layout: &Layout, name: &str, bytes: &[u8]) {
        let path = layout
            .install
            .join("Data")
            .join("indices")
            .join(format!("{name}.index"));
        std::fs::write(path, bytes).expect("Operation should succeed");
    }

    fn put_cached(layout: &Layout, name: &str, bytes: &[u8]) {
        let path = layout.cache.full_path(&index_cache_key(name));
        std::fs::create_dir_all(path.parent().expect("Operation should succeed"))
            .expect("Operation should succeed");
        std::fs::write(path, bytes).expect("Operation should succeed");
    }

    fn mirrors() -> Mirrors {
        Mirrors::new(vec!["127.0.0.1:9".to_string()], "tpr/wow")
    }

    #[tokio::test]
    async fn test_tiers_sorted_install_cache_unresolved() {
        let layout = layout();
        let installed = build_index(&[(key(1, 16), 1, 1)], 16, 8);
        let cached = build_index(&[(key(2, 16), 2, 2)], 16, 8);
        put_installed(&layout, &installed.name, &installed.bytes);
        put_cached(&layout, &cached.name, &cached.bytes);
        let missing = "ffffffffffffffffffffffffffffffff".to_string();

        let resolver = IndexResolver::new(
            mirrors(),
            Some(layout.install.as_path()),
            &[missing.clone(), cached.name.clone(), installed.name.clone()],
            layout.cache.clone(),
            Arc::new(OfflineTransport::default()),
        )
        .await;

        assert_eq!(
            resolver.tiers(),
            vec![
                (installed.name.clone(), IndexTier::LocalInstall),
                (cached.name.clone(), IndexTier::Cache),
                (missing, IndexTier::Unresolved),
            ]
        );
    }

    #[tokio::test]
    async fn test_local_copy_wins_without_network() {
        let layout = layout();
        let target = key(7, 16);
        let fixture = build_index(&[(target.clone(), 512, 1024)], 16, 8);
        put_installed(&layout, &fixture.name, &fixture.bytes);
        put_cached(&layout, &fixture.name, &fixture.bytes);

        let transport = Arc::new(OfflineTransport::default());
        let resolver = IndexResolver::new(
            mirrors(),
            Some(layout.install.as_path()),
            std::slice::from_ref(&fixture.name),
            layout.cache.clone(),
            transport.clone(),
        )
        .await;

        assert_eq!(resolver.tiers()[0].1, IndexTier::LocalInstall);
        let location = resolver
            .resolve(&target)
            .await
            .expect("Operation should succeed");
        assert_eq!(location, Some(Location::archived(fixture.name.clone(), 1024, 512)));
        assert_eq!(transport.gets.load(Ordering::SeqCst), 0);
        assert_eq!(transport.heads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_corrupt_index_becomes_unusable() {
        let layout = layout();
        let good = build_index(&[(key(3, 16), 30, 300)], 16, 8);
        let bad_name = "0123456789abcdef0123456789abcdef".to_string();
        put_cached(&layout, &bad_name, b"definitely not an index");
        put_cached(&layout, &good.name, &good.bytes);

        let resolver = IndexResolver::new(
            mirrors(),
            None,
            &[bad_name.clone(), good.name.clone()],
            layout.cache.clone(),
            Arc::new(OfflineTransport::default()),
        )
        .await;

        let location = resolver
            .resolve(&key(3, 16))
            .await
            .expect("Operation should succeed");
        assert_eq!(location, Some(Location::archived(good.name.clone(), 300, 30)));
        assert!(
            resolver
                .tiers()
                .contains(&(bad_name, IndexTier::Unusable))
        );
    }

    #[tokio::test]
    async fn test_not_found_after_failed_fetch_and_probe() {
        let layout = layout();
        let transport = Arc::new(OfflineTransport::default());
        let resolver = IndexResolver::new(
            Mirrors::new(vec!["a.invalid".to_string(), "b.invalid".to_string()], "tpr/wow"),
            Some(layout.install.as_path()),
            &["ffffffffffffffffffffffffffffffff".to_string()],
            layout.cache.clone(),
            transport.clone(),
        )
        .await;

        let location = resolver
            .resolve(&key(9, 16))
            .await
            .expect("Operation should succeed");
        assert_eq!(location, None);
        assert_eq!(transport.gets.load(Ordering::SeqCst), 2);
        assert_eq!(transport.heads.load(Ordering::SeqCst), 2);
        // Failed downloads leave nothing behind and the index stays unresolved
        assert!(
            !layout
                .cache
                .exists(&index_cache_key("ffffffffffffffffffffffffffffffff"))
                .await
        );
        assert_eq!(resolver.tiers()[0].1, IndexTier::Unresolved);
    }

    #[tokio::test]
    async fn test_partial_index_download_is_discarded_and_retried() {
        let layout = layout();
        let target = key(4, 16);
        let fixture = build_index(&[(target.clone(), 40, 400)], 16, 8);
        let slot = index_cache_key(&fixture.name);
        let transport = Arc::new(FlakyTransport {
            body: fixture.bytes.clone(),
            failures: 2,
            gets: AtomicUsize::new(0),
        });
        let resolver = IndexResolver::new(
            Mirrors::new(vec!["a.invalid".to_string(), "b.invalid".to_string()], "tpr/wow"),
            None,
            std::slice::from_ref(&fixture.name),
            layout.cache.clone(),
            transport.clone(),
        )
        .await;

        // Both mirrors break off mid-transfer
        let first = resolver
            .resolve(&target)
            .await
            .expect("Operation should succeed");
        assert_eq!(first, None);
        assert_eq!(transport.gets.load(Ordering::SeqCst), 2);
        assert!(!layout.cache.exists(&slot).await);
        assert_eq!(resolver.tiers()[0].1, IndexTier::Unresolved);

        // The next lookup downloads the index again
        let second = resolver
            .resolve(&target)
            .await
            .expect("Operation should succeed");
        assert_eq!(second, Some(Location::archived(fixture.name.clone(), 400, 40)));
        assert_eq!(transport.gets.load(Ordering::SeqCst), 3);
        assert_eq!(resolver.tiers()[0].1, IndexTier::Cache);
        assert_eq!(
            std::fs::read(layout.cache.full_path(&slot)).expect("Operation should succeed"),
            fixture.bytes
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_resolves_parse_index_once() {
        let layout = layout();
        let entries: Vec<_> = (0..64u32).map(|i| (key(i, 16), i + 1, i * 10)).collect();
        let fixture = build_index(&entries, 16, 8);
        put_cached(&layout, &fixture.name, &fixture.bytes);

        let resolver = Arc::new(
            IndexResolver::new(
                mirrors(),
                None,
                std::slice::from_ref(&fixture.name),
                layout.cache.clone(),
                Arc::new(OfflineTransport::default()),
            )
            .await,
        );

        let tasks: Vec<_> = entries
            .iter()
            .map(|(entry_key, length, offset)| {
                let resolver = Arc::clone(&resolver);
                let entry_key = entry_key.clone();
                let expected = Location::archived(
                    fixture.name.clone(),
                    u64::from(*offset),
                    u64::from(*length),
                );
                tokio::spawn(async move {
                    let location = resolver
                        .resolve(&entry_key)
                        .await
                        .expect("Operation should succeed");
                    assert_eq!(location, Some(expected));
                })
            })
            .collect();

        for task in tasks {
            task.await.expect("Operation should succeed");
        }
        assert_eq!(resolver.index_parses(), 1);
    }

    #[tokio::test]
    async fn test_rejects_short_key() {
        let layout = layout();
        let resolver = IndexResolver::new(
            mirrors(),
            None,
            &[],
            layout.cache.clone(),
            Arc::new(OfflineTransport::default()),
        )
        .await;
        assert!(matches!(
            resolver.resolve(&[0xAB]).await,
            Err(DataSourceError::InvalidHash(_))
        ));
    }

    #[test]
    fn test_missing_install_dir_is_ignored() {
        let dir = TempDir::new().expect("Operation should succeed");
        assert!(install_index_dir(dir.path()).is_none());
    }
}
