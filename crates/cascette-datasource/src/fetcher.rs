//! Archive downloads with mirror fallback
//!
//! Content is downloaded from the archive (or loose object) named by a
//! [`Location`], restricted to the entry's byte range when it has one, and
//! BLTE-decoded on its way to disk. Mirrors are tried in order; a failed
//! attempt leaves no file behind.

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::blte::BlteSink;
use crate::error::{DataSourceError, Result};
use crate::location::Location;
use crate::sink::ByteSink;
use crate::transport::{Transport, TransportError};
use crate::url::Mirrors;

/// Downloads archive content to local files
#[derive(Clone)]
pub struct ArchiveFetcher {
    mirrors: Mirrors,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for ArchiveFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveFetcher")
            .field("mirrors", &self.mirrors)
            .finish_non_exhaustive()
    }
}

impl ArchiveFetcher {
    pub fn new(mirrors: Mirrors, transport: Arc<dyn Transport>) -> Self {
        Self { mirrors, transport }
    }

    pub fn mirrors(&self) -> &Mirrors {
        &self.mirrors
    }

    /// Download and decode the content at `location` into `dest`.
    ///
    /// Returns the number of decoded bytes written. The result is not
    /// verified here.
    pub async fn fetch(&self, location: &Location, dest: &Path) -> Result<u64> {
        let range = match location.span() {
            Some(span) => Some(span.byte_range().ok_or_else(|| {
                DataSourceError::InvalidLocation(format!("{location} has no bytes to fetch"))
            })?),
            None => None,
        };

        if let Some(parent) = dest.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| DataSourceError::Destination {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        for host in self.mirrors.hosts() {
            let url = self.mirrors.data_url(host, location.archive())?;
            let mut sink =
                BlteSink::create(dest)
                    .await
                    .map_err(|source| DataSourceError::Destination {
                        path: dest.to_path_buf(),
                        source,
                    })?;

            debug!("Fetching {} from {}", location, host);
            let outcome = match self.transport.get(&url, &mut sink, range).await {
                Ok(_) => sink.finish().await.map_err(TransportError::from),
                Err(e) => Err(e),
            };
            let decoded = sink.decoded_bytes();
            drop(sink);

            match outcome {
                Ok(()) => {
                    info!(
                        "Extracted {} from {} to {} ({} bytes)",
                        location,
                        host,
                        dest.display(),
                        decoded
                    );
                    return Ok(decoded);
                }
                Err(e) => {
                    warn!("Fetching {} from {} failed: {}", location, host, e);
                    if let Err(remove) = tokio::fs::remove_file(dest).await
                        && remove.kind() != std::io::ErrorKind::NotFound
                    {
                        warn!("Could not remove {}: {}", dest.display(), remove);
                    }
                }
            }
        }

        Err(DataSourceError::AllHostsFailed {
            what: location.to_string(),
            hosts: self.mirrors.len(),
        })
    }
}
