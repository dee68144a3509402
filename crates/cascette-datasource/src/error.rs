//! Error types for the data source

use std::path::PathBuf;
use thiserror::Error;

use crate::blte::BlteError;
use crate::index::IndexError;
use crate::transport::TransportError;
use crate::verify::VerificationError;

/// Data source result type
pub type Result<T> = std::result::Result<T, DataSourceError>;

/// Failures that reach data source callers.
///
/// "Not found" is not an error; lookups return `Ok(None)` for it.
#[derive(Debug, Error)]
pub enum DataSourceError {
    /// Index could not be parsed or searched
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    /// Local I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Request failed on a single host
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Downloaded bytes were not a valid BLTE stream
    #[error("decode error: {0}")]
    Decode(#[from] BlteError),

    /// Cache slot could not be opened for writing
    #[error("could not open cache slot {key}: {source}")]
    CacheSlot {
        /// Cache key
        key: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// Destination file or its directory could not be prepared
    #[error("could not prepare destination {path}: {source}")]
    Destination {
        /// Destination path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Every configured mirror failed
    #[error("all {hosts} hosts failed to deliver {what}")]
    AllHostsFailed {
        /// What was being downloaded
        what: String,
        /// Number of hosts tried
        hosts: usize,
    },

    /// Extracted file failed verification
    #[error("verification failed: {0}")]
    Verification(#[from] VerificationError),

    /// Hash string is not valid hex
    #[error("invalid hash: {0}")]
    InvalidHash(String),

    /// Location cannot be fetched
    #[error("invalid location: {0}")]
    InvalidLocation(String),

    /// Configuration rejected
    #[error("configuration error: {0}")]
    Config(String),

    /// Blocking task panicked or was cancelled
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl DataSourceError {
    /// True when a host-level network failure caused this error
    pub fn is_transport_error(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::AllHostsFailed { .. })
    }

    /// True for index format problems that make the index unusable
    pub fn is_format_error(&self) -> bool {
        matches!(self, Self::Index(e) if e.is_format_error())
    }
}
