//! Write-side sinks that downloaded bytes are streamed into

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::blte::BlteError;

/// Sink failures
#[derive(Debug, Error)]
pub enum SinkError {
    /// Underlying file could not be written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Bytes could not be decoded from the container format
    #[error("decode error: {0}")]
    Decode(#[from] BlteError),
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Destination for a streamed response body
#[async_trait]
pub trait ByteSink {
    /// Accept the next piece of the body
    async fn write(&mut self, chunk: &[u8]) -> SinkResult<()>;

    /// Flush buffered state once the body is complete
    async fn finish(&mut self) -> SinkResult<()>;
}

/// Sink writing bytes to a file unchanged
#[derive(Debug)]
pub struct FileSink {
    file: File,
    path: PathBuf,
    written: u64,
}

impl FileSink {
    /// Create (or truncate) `path` for writing
    pub async fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).await?;
        Ok(Self {
            file,
            path,
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes written so far
    pub fn written(&self) -> u64 {
        self.written
    }
}

#[async_trait]
impl ByteSink for FileSink {
    async fn write(&mut self, chunk: &[u8]) -> SinkResult<()> {
        self.file.write_all(chunk).await?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    async fn finish(&mut self) -> SinkResult<()> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        Ok(())
    }
}

/// In-memory sink, handy for small metadata bodies
#[async_trait]
impl ByteSink for Vec<u8> {
    async fn write(&mut self, chunk: &[u8]) -> SinkResult<()> {
        self.extend_from_slice(chunk);
        Ok(())
    }

    async fn finish(&mut self) -> SinkResult<()> {
        Ok(())
    }
}
