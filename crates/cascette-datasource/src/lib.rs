//! TACT data source for NGDP content.
//!
//! Locates content by encoding key in CDN archive indexes and extracts it
//! from the archives, with mirror fallback and post-download verification.
//!
//! # Architecture
//!
//! - `index`: archive index parsing and block search
//! - `resolver`: tiered index lookup (install, cache, download) and the CDN
//!   existence probe
//! - `fetcher`: ranged archive downloads decoded through BLTE on the way to
//!   disk
//! - `verify`: size and MD5 checks on extracted files
//! - `source`: the [`DataSource`] contract and [`TactDataSource`]
//! - `cache`, `transport`, `sink`: local storage, HTTP, and write sinks
//!
//! # Example
//!
//! ```no_run
//! use cascette_datasource::{
//!     DataSourceConfig, ExtractOutcome, TactDataSource, decode_key,
//! };
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = DataSourceConfig {
//!         hosts: vec!["level3.blizzard.com".to_string()],
//!         index_hashes: vec!["0017a402f556fbece46c38dc431a2c9b".to_string()],
//!         ..DataSourceConfig::from_env()
//!     };
//!     let source = TactDataSource::from_config(&config).await?;
//!
//!     let key = decode_key("1c9cc9a9e3c6d54a8d4b8e6b3b1f7c12")?;
//!     match source
//!         .extract_hash(&key, Path::new("out.bin"), None)
//!         .await?
//!     {
//!         ExtractOutcome::Extracted { location, bytes } => {
//!             println!("{bytes} bytes from {location}");
//!         }
//!         ExtractOutcome::NotFound => println!("not found"),
//!     }
//!     Ok(())
//! }
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod blte;
pub mod cache;
pub mod checksum;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod index;
pub mod location;
pub mod resolver;
pub mod sink;
pub mod source;
pub mod transport;
pub mod url;
pub mod verify;

#[cfg(test)]
pub(crate) mod test_utils;

pub use cache::{CacheStore, DiskCache};
pub use config::{DataSourceConfig, TransportConfig};
pub use error::{DataSourceError, Result};
pub use fetcher::ArchiveFetcher;
pub use index::{IndexEntry, IndexError, IndexHandle};
pub use location::{ArchiveSpan, Location};
pub use resolver::{IndexResolver, IndexTier};
pub use source::{
    DataSource, ExtractOptions, ExtractOutcome, TactDataSource, decode_content_hash, decode_key,
};
pub use transport::{ByteRange, HttpTransport, Transport, TransportError};
pub use url::Mirrors;
