//! Post-download verification of extracted files

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::checksum::md5_file;

/// Reasons an extracted file is rejected
#[derive(Debug, Error)]
pub enum VerificationError {
    /// Nothing was written at the destination
    #[error("{0} does not exist")]
    Missing(PathBuf),

    /// The destination is empty
    #[error("{0} is empty")]
    Empty(PathBuf),

    /// Content hash differs from the one requested
    #[error("{path} has MD5 {actual}, expected {expected}")]
    HashMismatch {
        /// Destination path
        path: PathBuf,
        /// Requested hash (hex)
        expected: String,
        /// Hash of the file (hex)
        actual: String,
    },

    /// The destination could not be read back
    #[error("could not read {path}: {source}")]
    Unreadable {
        /// Destination path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
}

/// Check that `path` exists, is non-empty and, when `content_hash` is
/// given, hashes to it
pub async fn verify_file(path: &Path, content_hash: Option<&[u8; 16]>) -> Result<(), VerificationError> {
    let meta = match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => meta,
        Ok(_) => return Err(VerificationError::Missing(path.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(VerificationError::Missing(path.to_path_buf()));
        }
        Err(source) => {
            return Err(VerificationError::Unreadable {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    if meta.len() == 0 {
        return Err(VerificationError::Empty(path.to_path_buf()));
    }

    if let Some(expected) = content_hash {
        let actual = md5_file(path)
            .await
            .map_err(|source| VerificationError::Unreadable {
                path: path.to_path_buf(),
                source,
            })?;
        if actual != *expected {
            return Err(VerificationError::HashMismatch {
                path: path.to_path_buf(),
                expected: hex::encode(expected),
                actual: hex::encode(actual),
            });
        }
    }

    debug!("Verified {} ({} bytes)", path.display(), meta.len());
    Ok(())
}

/// Verify an extracted file and delete it on failure unless `preserve` is set
pub async fn verify_or_discard(
    path: &Path,
    content_hash: Option<&[u8; 16]>,
    preserve: bool,
) -> Result<(), VerificationError> {
    let result = verify_file(path, content_hash).await;
    if let Err(e) = &result {
        if preserve {
            warn!("Keeping {} for inspection: {}", path.display(), e);
        } else {
            warn!("Removing {}: {}", path.display(), e);
            if let Err(remove) = tokio::fs::remove_file(path).await
                && remove.kind() != std::io::ErrorKind::NotFound
            {
                warn!("Could not remove {}: {}", path.display(), remove);
            }
        }
    }
    result
}
