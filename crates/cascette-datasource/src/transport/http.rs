//! reqwest-backed transport

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::StatusCode;
use reqwest::header::RANGE;
use std::sync::Once;
use tracing::{debug, trace};

use super::{ByteRange, Transport, TransportError, TransportResult};
use crate::config::TransportConfig;
use crate::sink::ByteSink;

static CRYPTO_PROVIDER: Once = Once::new();

/// Install the ring provider for rustls once per process.
///
/// reqwest is built without a default provider; a provider installed by the
/// embedding application wins.
pub fn ensure_crypto_provider() {
    CRYPTO_PROVIDER.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// HTTP transport for CDN mirrors
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a client with the configured timeouts and user agent
    pub fn new(config: &TransportConfig) -> TransportResult<Self> {
        ensure_crypto_provider();
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Some(config.pool_idle_timeout))
            .pool_max_idle_per_host(config.max_idle_per_host)
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(
        &self,
        url: &str,
        sink: &mut (dyn ByteSink + Send),
        range: Option<ByteRange>,
    ) -> TransportResult<u64> {
        let mut request = self.client.get(url);
        if let Some(range) = range {
            trace!("GET {} range {}", url, range);
            request = request.header(RANGE, range.header_value());
        } else {
            trace!("GET {}", url);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status));
        }
        if let Some(range) = range
            && status != StatusCode::PARTIAL_CONTENT
        {
            return Err(TransportError::RangeIgnored { range, status });
        }

        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            sink.write(&chunk).await?;
            written += chunk.len() as u64;
        }

        debug!("Received {} bytes from {} (status {})", written, url, status);
        Ok(written)
    }

    async fn head(&self, url: &str) -> TransportResult<StatusCode> {
        let status = self.client.head(url).send().await?.status();
        trace!("HEAD {} -> {}", url, status);
        Ok(status)
    }
}
