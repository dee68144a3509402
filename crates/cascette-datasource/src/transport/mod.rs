//! HTTP transport abstraction used for index and archive downloads
//!
//! The resolver and fetcher only talk to [`Transport`]; [`HttpTransport`] is
//! the reqwest-backed implementation used in production.

mod http;

pub use http::HttpTransport;

use async_trait::async_trait;
use reqwest::StatusCode;
use std::fmt;
use thiserror::Error;

use crate::sink::{ByteSink, SinkError};

/// Inclusive byte range, rendered as `start-end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteRange {
    /// First byte offset
    pub start: u64,
    /// Last byte offset (inclusive)
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Number of bytes covered by the range
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start) + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    /// Value for the HTTP `Range` header
    pub fn header_value(&self) -> String {
        format!("bytes={self}")
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Transport failures
#[derive(Debug, Error)]
pub enum TransportError {
    /// Request could not be sent or the body stream broke
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("HTTP status: {0}")]
    Status(StatusCode),

    /// A range was requested but the server answered with another status
    #[error("range {range} not honoured (HTTP status {status})")]
    RangeIgnored { range: ByteRange, status: StatusCode },

    /// The sink rejected the bytes (I/O or decode failure)
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),
}

impl TransportError {
    /// True when the body arrived but could not be decoded
    pub fn is_decode_error(&self) -> bool {
        matches!(self, Self::Sink(SinkError::Decode(_)))
    }
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Minimal HTTP surface the data source needs
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET `url`, streaming the body into `sink`.
    ///
    /// Returns the number of body bytes handed to the sink. The sink is not
    /// finished by the transport; that is the caller's decision. With a
    /// range, only `206 Partial Content` is accepted.
    async fn get(
        &self,
        url: &str,
        sink: &mut (dyn ByteSink + Send),
        range: Option<ByteRange>,
    ) -> TransportResult<u64>;

    /// HEAD `url` and return the response status
    async fn head(&self, url: &str) -> TransportResult<StatusCode>;
}
