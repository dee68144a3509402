//! Data source contract and the TACT-backed implementation

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::cache::{CacheStore, DiskCache};
use crate::config::DataSourceConfig;
use crate::error::{DataSourceError, Result};
use crate::fetcher::ArchiveFetcher;
use crate::location::Location;
use crate::resolver::IndexResolver;
use crate::transport::{HttpTransport, Transport};
use crate::url::Mirrors;
use crate::verify::verify_or_discard;

/// Per-extraction settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Keep a file that fails verification instead of deleting it
    pub preserve_failed: bool,
}

/// Result of [`TactDataSource::extract_hash`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractOutcome {
    /// Content was written and verified
    Extracted {
        /// Where the content came from
        location: Location,
        /// Decoded bytes written
        bytes: u64,
    },
    /// No index or mirror knows the key
    NotFound,
}

impl ExtractOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Extracted { .. })
    }
}

/// A place content can be located in and fetched from
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Locate content by encoding key; `Ok(None)` when it is not available
    async fn find_location(&self, key: &[u8]) -> Result<Option<Location>>;

    /// Write the content at `location` to `dest`, returning the bytes written
    async fn fetch(&self, location: &Location, dest: &Path) -> Result<u64>;

    /// Fetch and verify.
    ///
    /// The file must exist, be non-empty and, when `content_hash` is given,
    /// match it. A file failing these checks is removed unless
    /// `options.preserve_failed` is set.
    async fn extract_file(
        &self,
        location: &Location,
        dest: &Path,
        content_hash: Option<&[u8; 16]>,
        options: &ExtractOptions,
    ) -> Result<u64> {
        let bytes = self.fetch(location, dest).await?;
        verify_or_discard(dest, content_hash, options.preserve_failed).await?;
        Ok(bytes)
    }
}

/// Data source backed by CDN archives and their indexes
#[derive(Debug)]
pub struct TactDataSource {
    resolver: IndexResolver,
    fetcher: ArchiveFetcher,
    options: ExtractOptions,
}

impl TactDataSource {
    pub fn new(resolver: IndexResolver, fetcher: ArchiveFetcher, options: ExtractOptions) -> Self {
        Self {
            resolver,
            fetcher,
            options,
        }
    }

    /// Build a data source with an HTTP transport and a disk cache
    pub async fn from_config(config: &DataSourceConfig) -> Result<Self> {
        config.validate()?;
        let transport = Arc::new(HttpTransport::new(&config.transport)?);
        let cache = Arc::new(DiskCache::new(&config.cache_dir));
        Self::with_collaborators(config, cache, transport).await
    }

    /// Build a data source around an existing cache and transport
    pub async fn with_collaborators(
        config: &DataSourceConfig,
        cache: Arc<dyn CacheStore>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        config.validate()?;
        let hosts = config
            .hosts
            .iter()
            .map(|host| host.trim().to_string())
            .filter(|host| !host.is_empty())
            .collect();
        let mirrors = Mirrors::new(hosts, config.cdn_path.clone());

        let resolver = IndexResolver::new(
            mirrors.clone(),
            config.install_path.as_deref(),
            &config.index_hashes,
            cache,
            Arc::clone(&transport),
        )
        .await;
        let fetcher = ArchiveFetcher::new(mirrors, transport);
        let options = ExtractOptions {
            preserve_failed: config.preserve_failed_extractions,
        };

        debug!("Data source ready: {:?}", resolver);
        Ok(Self::new(resolver, fetcher, options))
    }

    pub fn resolver(&self) -> &IndexResolver {
        &self.resolver
    }

    pub fn fetcher(&self) -> &ArchiveFetcher {
        &self.fetcher
    }

    /// Options taken from the configuration
    pub fn options(&self) -> ExtractOptions {
        self.options
    }

    /// Resolve `key` and extract it to `dest` with the configured options
    pub async fn extract_hash(
        &self,
        key: &[u8],
        dest: &Path,
        content_hash: Option<&[u8; 16]>,
    ) -> Result<ExtractOutcome> {
        let Some(location) = self.find_location(key).await? else {
            info!("{} not found", hex::encode(key));
            return Ok(ExtractOutcome::NotFound);
        };
        let bytes = self
            .extract_file(&location, dest, content_hash, &self.options)
            .await?;
        Ok(ExtractOutcome::Extracted { location, bytes })
    }
}

#[async_trait]
impl DataSource for TactDataSource {
    async fn find_location(&self, key: &[u8]) -> Result<Option<Location>> {
        self.resolver.resolve(key).await
    }

    async fn fetch(&self, location: &Location, dest: &Path) -> Result<u64> {
        self.fetcher.fetch(location, dest).await
    }
}

/// Decode a hex encoding key
pub fn decode_key(value: &str) -> Result<Vec<u8>> {
    let key = hex::decode(value.trim()).map_err(|_| DataSourceError::InvalidHash(value.to_string()))?;
    if key.len() < 2 {
        return Err(DataSourceError::InvalidHash(value.to_string()));
    }
    Ok(key)
}

/// Decode a hex MD5 content hash
pub fn decode_content_hash(value: &str) -> Result<[u8; 16]> {
    let mut hash = [0u8; 16];
    hex::decode_to_slice(value.trim(), &mut hash)
        .map_err(|_| DataSourceError::InvalidHash(value.to_string()))?;
    Ok(hash)
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::checksum::md5_of;
    use crate::sink::ByteSink;
    use crate::test_utils::blte_single_chunk;
    use crate::transport::{ByteRange, TransportError, TransportResult};
    use reqwest::StatusCode;
    use tempfile::TempDir;

    /// Source whose fetch writes a fixed body
    struct FixedSource {
        body: Vec<u8>,
    }

    #[async_trait]
    impl DataSource for FixedSource {
        async fn find_location(&self, _key: &[u8]) -> Result<Option<Location>> {
            Ok(None)
        }

        async fn fetch(&self, _location: &Location, dest: &Path) -> Result<u64> {
            tokio::fs::write(dest, &self.body).await?;
            Ok(self.body.len() as u64)
        }
    }

    #[tokio::test]
    async fn test_extract_file_verifies_content_hash() {
        let dir = TempDir::new().expect("Operation should succeed");
        let dest = dir.path().join("out.bin");
        let source = FixedSource {
            body: b"verified".to_vec(),
        };
        let location = Location::whole("00112233445566778899aabbccddeeff");

        let bytes = source
            .extract_file(&location, &dest, Some(&md5_of(b"verified")), &ExtractOptions::default())
            .await
            .expect("Operation should succeed");
        assert_eq!(bytes, 8);
        assert!(dest.exists());

        let err = source
            .extract_file(&location, &dest, Some(&md5_of(b"other")), &ExtractOptions::default())
            .await
            .expect_err("Test operation should fail");
        assert!(matches!(err, DataSourceError::Verification(_)));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_extract_file_preserves_when_asked() {
        let dir = TempDir::new().expect("Operation should succeed");
        let dest = dir.path().join("out.bin");
        let source = FixedSource { body: Vec::new() };
        let options = ExtractOptions {
            preserve_failed: true,
        };

        let err = source
            .extract_file(&Location::whole("abcd"), &dest, None, &options)
            .await
            .expect_err("Test operation should fail");
        assert!(matches!(err, DataSourceError::Verification(_)));
        assert!(dest.exists());
    }

    struct NoNetwork;

    #[async_trait]
    impl Transport for NoNetwork {
        async fn get(
            &self,
            _url: &str,
            _sink: &mut (dyn ByteSink + Send),
            _range: Option<ByteRange>,
        ) -> TransportResult<u64> {
            Err(TransportError::Status(StatusCode::NOT_FOUND))
        }

        async fn head(&self, _url: &str) -> TransportResult<StatusCode> {
            Ok(StatusCode::NOT_FOUND)
        }
    }

    #[tokio::test]
    async fn test_extract_hash_not_found() {
        let dir = TempDir::new().expect("Operation should succeed");
        let config = DataSourceConfig {
            hosts: vec!["cdn.invalid".to_string()],
            cache_dir: dir.path().join("cache"),
            preserve_failed_extractions: true,
            ..DataSourceConfig::default()
        };
        let source = TactDataSource::with_collaborators(
            &config,
            Arc::new(DiskCache::new(&config.cache_dir)),
            Arc::new(NoNetwork),
        )
        .await
        .expect("Operation should succeed");
        assert!(source.options().preserve_failed);

        let dest = dir.path().join("out.bin");
        let outcome = source
            .extract_hash(&[0xde, 0xad, 0xbe, 0xef], &dest, None)
            .await
            .expect("Operation should succeed");
        assert_eq!(outcome, ExtractOutcome::NotFound);
        assert!(!outcome.is_found());
        assert!(!dest.exists());
    }

    /// Every key exists as a loose object holding `body`
    struct LooseObjects {
        body: Vec<u8>,
    }

    #[async_trait]
    impl Transport for LooseObjects {
        async fn get(
            &self,
            _url: &str,
            sink: &mut (dyn ByteSink + Send),
            _range: Option<ByteRange>,
        ) -> TransportResult<u64> {
            sink.write(&self.body).await?;
            Ok(self.body.len() as u64)
        }

        async fn head(&self, _url: &str) -> TransportResult<StatusCode> {
            Ok(StatusCode::OK)
        }
    }

    async fn loose_source(dir: &TempDir, preserve: bool) -> TactDataSource {
        let config = DataSourceConfig {
            hosts: vec!["cdn.invalid".to_string()],
            cache_dir: dir.path().join("cache"),
            preserve_failed_extractions: preserve,
            ..DataSourceConfig::default()
        };
        TactDataSource::with_collaborators(
            &config,
            Arc::new(DiskCache::new(&config.cache_dir)),
            Arc::new(LooseObjects {
                body: blte_single_chunk(b"unexpected"),
            }),
        )
        .await
        .expect("Operation should succeed")
    }

    #[tokio::test]
    async fn test_extract_hash_follows_configured_preserve_flag() {
        let dir = TempDir::new().expect("Operation should succeed");
        let dest = dir.path().join("out.bin");
        let wanted = md5_of(b"expected");

        let discarding = loose_source(&dir, false).await;
        let err = discarding
            .extract_hash(&[0xab, 0xcd, 0xef, 0x01], &dest, Some(&wanted))
            .await
            .expect_err("Test operation should fail");
        assert!(matches!(err, DataSourceError::Verification(_)));
        assert!(!dest.exists());

        let preserving = loose_source(&dir, true).await;
        let err = preserving
            .extract_hash(&[0xab, 0xcd, 0xef, 0x01], &dest, Some(&wanted))
            .await
            .expect_err("Test operation should fail");
        assert!(matches!(err, DataSourceError::Verification(_)));
        assert_eq!(
            std::fs::read(&dest).expect("Operation should succeed"),
            b"unexpected"
        );
    }

    #[tokio::test]
    async fn test_from_config_rejects_invalid_config() {
        let err = TactDataSource::from_config(&DataSourceConfig::default())
            .await
            .expect_err("Test operation should fail");
        assert!(matches!(err, DataSourceError::Config(_)));
    }

    #[test]
    fn test_decode_helpers() {
        assert_eq!(
            decode_key("DEADbeef").expect("Operation should succeed"),
            vec![0xde, 0xad, 0xbe, 0xef]
        );
        assert!(decode_key("xyz").is_err());
        assert!(decode_key("ab").is_err());

        let hash = decode_content_hash("9e107d9d372bb6826bd81d3542a419d6")
            .expect("Operation should succeed");
        assert_eq!(hash[0], 0x9e);
        assert!(decode_content_hash("9e107d").is_err());
    }
}
