//! Archive index parsing and lookup
//!
//! An archive index maps encoding keys to `(offset, length)` spans inside
//! one CDN archive. The file is a run of 4096-byte blocks of sorted
//! `key | length | offset` slots, a table of contents, and a footer whose
//! checksum width must be probed (see [`footer`]).
//!
//! [`IndexHandle::read`] parses the geometry and loads only the first key of
//! every block. Lookups binary-search those keys and then read and scan a
//! single block.
//!
//! ```no_run
//! use cascette_datasource::index::IndexHandle;
//!
//! # fn example() -> Result<(), cascette_datasource::index::IndexError> {
//! let name = "0017a402f556fbece46c38dc431a2c9b";
//! let handle = IndexHandle::open(name, format!("cache/data/{name}.index"))?;
//! let key = hex::decode("1c9cc9a9e3c6d54a8d").unwrap_or_default();
//! if let Some(entry) = handle.lookup(&key)? {
//!     println!("offset {} length {}", entry.offset, entry.length);
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod footer;
pub mod search;
pub mod toc;

pub use error::{IndexError, IndexResult};
pub use footer::{IndexFooter, MAX_FOOTER_SIZE, footer_size, probe_checksum_size};
pub use search::{IndexEntry, block_entries, find_block, scan_block};
pub use toc::{BLOCK_SIZE, Placement, TocPlacement, place_toc, toc_size};

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Parsed geometry of one archive index, keyed by the index hash
#[derive(Debug, Clone)]
pub struct IndexHandle {
    name: String,
    path: PathBuf,
    file_len: u64,
    footer: IndexFooter,
    block_map: Vec<Vec<u8>>,
}

impl IndexHandle {
    /// Open and parse the index stored at `path` under hash `name`
    pub fn open(name: &str, path: impl AsRef<Path>) -> IndexResult<Self> {
        let path = path.as_ref();
        let mut file = File::open(path)?;
        Self::read(name, path, &mut file)
    }

    /// Parse an index from any seekable reader.
    ///
    /// `path` is remembered for later lookups through [`lookup`](Self::lookup).
    pub fn read<R: Read + Seek>(
        name: &str,
        path: impl Into<PathBuf>,
        reader: &mut R,
    ) -> IndexResult<Self> {
        let file_len = reader.seek(SeekFrom::End(0))?;

        let tail_len = file_len.min(MAX_FOOTER_SIZE as u64);
        let mut tail = vec![0u8; tail_len as usize];
        reader.seek(SeekFrom::Start(file_len - tail_len))?;
        reader.read_exact(&mut tail)?;

        let checksum_size = probe_checksum_size(&tail, name)
            .ok_or_else(|| IndexError::ChecksumSizeNotFound(name.to_string()))?;
        let footer = IndexFooter::parse(&tail, checksum_size)?;
        if footer.key_size == 0 {
            return Err(IndexError::InvalidKeySize(footer.key_size));
        }

        let footer_start = file_len - footer.size() as u64;
        let placement = match place_toc(footer_start, footer.key_size, checksum_size) {
            Placement::Placed(placement) => placement,
            Placement::Gap { toc_end } => {
                return Err(IndexError::TocPlacement {
                    index: name.to_string(),
                    toc_end,
                    footer_start,
                });
            }
        };

        let key_size = footer.key_size as usize;
        let mut block_map = Vec::with_capacity(placement.block_count as usize);
        for block in 0..placement.block_count {
            let mut first_key = vec![0u8; key_size];
            reader.seek(SeekFrom::Start(block * BLOCK_SIZE))?;
            reader.read_exact(&mut first_key)?;
            block_map.push(first_key);
        }

        debug!(
            "Parsed index {}: {} blocks, key size {}, checksum size {}, {} entries",
            name,
            block_map.len(),
            footer.key_size,
            checksum_size,
            footer.num_elements
        );

        Ok(Self {
            name: name.to_string(),
            path: path.into(),
            file_len,
            footer,
            block_map,
        })
    }

    /// Hash the index is stored under
    pub fn name(&self) -> &str {
        &self.name
    }

    /// File the index was parsed from
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_len(&self) -> u64 {
        self.file_len
    }

    /// Width of the keys this index stores
    pub fn key_size(&self) -> usize {
        self.footer.key_size as usize
    }

    pub fn block_size(&self) -> u64 {
        BLOCK_SIZE
    }

    pub fn block_count(&self) -> usize {
        self.block_map.len()
    }

    /// First key of every block, ascending
    pub fn block_map(&self) -> &[Vec<u8>] {
        &self.block_map
    }

    pub fn footer(&self) -> &IndexFooter {
        &self.footer
    }

    /// Look `key` up in the file this handle was parsed from.
    ///
    /// Only the first [`key_size`](Self::key_size) bytes of `key` are used.
    pub fn lookup(&self, key: &[u8]) -> IndexResult<Option<IndexEntry>> {
        let mut file = File::open(&self.path)?;
        self.find(&mut file, key)
    }

    /// Look `key` up in `reader`, which must hold the same bytes that were
    /// parsed
    pub fn find<R: Read + Seek>(&self, reader: &mut R, key: &[u8]) -> IndexResult<Option<IndexEntry>> {
        let Some(key) = key.get(..self.key_size()) else {
            trace!(
                "Key of {} bytes shorter than index {} key size {}",
                key.len(),
                self.name,
                self.key_size()
            );
            return Ok(None);
        };

        let Some(block) = find_block(&self.block_map, key) else {
            trace!("Key {} sorts before index {}", hex::encode(key), self.name);
            return Ok(None);
        };

        let data = self.read_block(reader, block)?;
        let entry = scan_block(&data, key);
        trace!(
            "Key {} in index {} block {}: {}",
            hex::encode(key),
            self.name,
            block,
            if entry.is_some() { "hit" } else { "miss" }
        );
        Ok(entry)
    }

    /// All entries stored in block `block`, up to its terminator
    pub fn entries_in_block(&self, block: usize) -> IndexResult<Vec<(Vec<u8>, IndexEntry)>> {
        let mut file = File::open(&self.path)?;
        let data = self.read_block(&mut file, block)?;
        Ok(block_entries(&data, self.key_size())
            .map(|(key, entry)| (key.to_vec(), entry))
            .collect())
    }

    fn read_block<R: Read + Seek>(&self, reader: &mut R, block: usize) -> IndexResult<Vec<u8>> {
        if block >= self.block_map.len() {
            return Err(IndexError::BlockOutOfRange {
                block,
                count: self.block_map.len(),
            });
        }
        let mut data = vec![0u8; BLOCK_SIZE as usize];
        reader.seek(SeekFrom::Start(block as u64 * BLOCK_SIZE))?;
        reader.read_exact(&mut data)?;
        Ok(data)
    }
}
