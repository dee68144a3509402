//! Index footer probing and parsing
//!
//! The footer's checksum width is not stored at a fixed offset. Each width
//! from 16 down to 0 is tried: the byte where the `checksum_size` field would
//! sit must hold that width, and the MD5 of the last `0x14 + width` bytes
//! must equal the index name. Only a width passing both checks is accepted.
//!
//! Footer layout for width `c` (`12 + 3c` bytes):
//!
//! ```text
//! index_block_hash  c bytes
//! toc_hash          c bytes
//! version           1 byte  \
//! reserved          2 bytes  |
//! page_size_kb      1 byte   |
//! offset_bytes      1 byte   | 12-byte record
//! size_bytes        1 byte   |
//! key_size          1 byte   |
//! checksum_size     1 byte   |
//! num_elements      4 bytes /
//! footer_hash       c bytes
//! ```
//!
//! All functions here work on the tail of the file: any slice that ends at
//! the last byte of the index and is long enough for the footer.

use super::error::{IndexError, IndexResult};
use crate::checksum::md5_of;

/// Fixed record inside the footer
pub const FOOTER_RECORD_SIZE: usize = 12;

/// Widest checksum the probe considers
pub const MAX_CHECKSUM_SIZE: u8 = 16;

/// Longest tail any footer can need
pub const MAX_FOOTER_SIZE: usize = FOOTER_RECORD_SIZE + 3 * MAX_CHECKSUM_SIZE as usize;

/// Bytes hashed to confirm a checksum width, before adding the width
const NAME_CHECK_BASE: usize = 0x14;

/// Total footer size for a checksum width
pub fn footer_size(checksum_size: u8) -> usize {
    FOOTER_RECORD_SIZE + 3 * checksum_size as usize
}

/// Find the checksum width of an index footer.
///
/// `tail` ends at the last byte of the index file. `index_name` is the hex
/// hash the file is stored under.
pub fn probe_checksum_size(tail: &[u8], index_name: &str) -> Option<u8> {
    (0..=MAX_CHECKSUM_SIZE).rev().find(|&candidate| {
        let c = candidate as usize;
        let Some(field_pos) = tail.len().checked_sub(c + 4 + 1) else {
            return false;
        };
        if tail[field_pos] != candidate {
            return false;
        }

        let check_len = NAME_CHECK_BASE + c;
        let Some(check_start) = tail.len().checked_sub(check_len) else {
            return false;
        };
        hex::encode(md5_of(&tail[check_start..])).eq_ignore_ascii_case(index_name)
    })
}

/// Parsed index footer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexFooter {
    /// Hash of the last block
    pub index_block_hash: Vec<u8>,
    /// Hash of the table of contents
    pub toc_hash: Vec<u8>,
    /// Version, reserved and page size bytes, not interpreted
    pub unknown: [u8; 4],
    /// Width of the offset field in entries
    pub offset_bytes: u8,
    /// Width of the size field in entries
    pub size_bytes: u8,
    /// Width of entry keys
    pub key_size: u8,
    /// Width of the footer checksums
    pub checksum_size: u8,
    /// Number of entries in the index (little-endian on disk)
    pub num_elements: u32,
    /// Truncated MD5 of the footer record
    pub footer_hash: Vec<u8>,
}

impl IndexFooter {
    /// Parse the footer for a confirmed checksum width
    pub fn parse(tail: &[u8], checksum_size: u8) -> IndexResult<Self> {
        let c = checksum_size as usize;
        let size = footer_size(checksum_size);
        let start = tail.len().checked_sub(size).ok_or(IndexError::Truncated {
            needed: size,
            actual: tail.len(),
        })?;
        let bytes = &tail[start..];

        let record = &bytes[2 * c..2 * c + FOOTER_RECORD_SIZE];
        let mut unknown = [0u8; 4];
        unknown.copy_from_slice(&record[..4]);

        Ok(Self {
            index_block_hash: bytes[..c].to_vec(),
            toc_hash: bytes[c..2 * c].to_vec(),
            unknown,
            offset_bytes: record[4],
            size_bytes: record[5],
            key_size: record[6],
            checksum_size: record[7],
            num_elements: u32::from_le_bytes([record[8], record[9], record[10], record[11]]),
            footer_hash: bytes[size - c..].to_vec(),
        })
    }

    /// Size of this footer in bytes
    pub fn size(&self) -> usize {
        footer_size(self.checksum_size)
    }
}
