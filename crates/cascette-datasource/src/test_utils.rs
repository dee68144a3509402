//! Fixture builders for index files and BLTE bodies
//!
//! Only compiled for tests. The integration tests include this file through
//! `tests/common`, so it must not refer to other crate modules.
#![allow(dead_code, clippy::expect_used)]

use md5::{Digest, Md5};

pub const BLOCK_SIZE: usize = 4096;

/// One index entry: key, length, offset
pub type FixtureEntry = (Vec<u8>, u32, u32);

/// Index file bytes plus the name (hex MD5 of its footer tail) it must be
/// stored under
#[derive(Debug, Clone)]
pub struct IndexFixture {
    pub name: String,
    pub bytes: Vec<u8>,
    pub key_size: u8,
    pub checksum_size: u8,
    pub block_count: usize,
}

fn md5(data: &[u8]) -> [u8; 16] {
    let mut out = [0u8; 16];
    out.copy_from_slice(&Md5::digest(data));
    out
}

/// Key of `key_size` bytes derived from a seed, so fixtures are reproducible
pub fn key(seed: u32, key_size: u8) -> Vec<u8> {
    let mut key = md5(&seed.to_be_bytes()).to_vec();
    key.resize(key_size as usize, 0x5A);
    key
}

/// Entries that fit into one block for a given key size
pub fn entries_per_block(key_size: u8) -> usize {
    BLOCK_SIZE / (key_size as usize + 8)
}

/// Build an index from entries, sorting them and packing full blocks
pub fn build_index(entries: &[FixtureEntry], key_size: u8, checksum_size: u8) -> IndexFixture {
    let mut sorted = entries.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    let blocks: Vec<Vec<FixtureEntry>> = sorted
        .chunks(entries_per_block(key_size))
        .map(<[FixtureEntry]>::to_vec)
        .collect();
    build_index_blocks(&blocks, key_size, checksum_size)
}

/// Build an index with an explicit block layout; an empty block is all zeros
pub fn build_index_blocks(
    blocks: &[Vec<FixtureEntry>],
    key_size: u8,
    checksum_size: u8,
) -> IndexFixture {
    let k = key_size as usize;
    let c = checksum_size as usize;
    let mut bytes = Vec::new();
    let mut last_keys = Vec::new();
    let mut total_entries = 0u32;

    for block in blocks {
        let mut data = vec![0u8; BLOCK_SIZE];
        let mut pos = 0;
        for (entry_key, length, offset) in block {
            assert_eq!(entry_key.len(), k, "fixture key has wrong width");
            data[pos..pos + k].copy_from_slice(entry_key);
            data[pos + k..pos + k + 4].copy_from_slice(&length.to_be_bytes());
            data[pos + k + 4..pos + k + 8].copy_from_slice(&offset.to_be_bytes());
            pos += k + 8;
        }
        total_entries += block.len() as u32;
        last_keys.push(
            block
                .last()
                .map_or_else(|| vec![0u8; k], |(entry_key, _, _)| entry_key.clone()),
        );
        bytes.extend_from_slice(&data);
    }

    // Table of contents: one key per block, then one hash per block except
    // the last, whose hash moves into the footer.
    for last_key in &last_keys {
        bytes.extend_from_slice(last_key);
    }
    let mut block_hashes = Vec::new();
    for chunk in bytes[..blocks.len() * BLOCK_SIZE].chunks(BLOCK_SIZE) {
        block_hashes.push(md5(chunk)[..c].to_vec());
    }
    for hash in block_hashes.iter().take(blocks.len().saturating_sub(1)) {
        bytes.extend_from_slice(hash);
    }

    let toc_hash = md5(&bytes[blocks.len() * BLOCK_SIZE..]);
    bytes.extend_from_slice(block_hashes.last().map_or(&[][..], Vec::as_slice));
    if block_hashes.is_empty() {
        bytes.extend(std::iter::repeat_n(0u8, c));
    }
    bytes.extend_from_slice(&toc_hash[..c]);

    let mut record = vec![1u8, 0, 0, 4, 4, 4, key_size, checksum_size];
    record.extend_from_slice(&total_entries.to_le_bytes());
    let mut footer_check = record.clone();
    footer_check.resize(20, 0);
    bytes.extend_from_slice(&record);
    bytes.extend_from_slice(&md5(&footer_check)[..c]);

    let tail = &bytes[bytes.len() - (0x14 + c)..];
    let name = hex::encode(md5(tail));

    IndexFixture {
        name,
        bytes,
        key_size,
        checksum_size,
        block_count: blocks.len(),
    }
}

/// Single-chunk BLTE body with a raw (`N`) chunk
pub fn blte_single_chunk(data: &[u8]) -> Vec<u8> {
    let mut out = b"BLTE".to_vec();
    out.extend_from_slice(&0u32.to_be_bytes());
    out.push(b'N');
    out.extend_from_slice(data);
    out
}

/// Multi-chunk BLTE body; even parts are raw, odd parts are zlib
pub fn blte_multi_chunk(parts: &[&[u8]]) -> Vec<u8> {
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use std::io::Write;

    let encoded: Vec<Vec<u8>> = parts
        .iter()
        .enumerate()
        .map(|(i, part)| {
            if i % 2 == 0 {
                let mut chunk = vec![b'N'];
                chunk.extend_from_slice(part);
                chunk
            } else {
                let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(part).expect("Operation should succeed");
                let mut chunk = vec![b'Z'];
                chunk.extend(encoder.finish().expect("Operation should succeed"));
                chunk
            }
        })
        .collect();

    let header_size = 12 + 24 * parts.len();
    let mut out = b"BLTE".to_vec();
    out.extend_from_slice(&(header_size as u32).to_be_bytes());
    out.push(0x0F);
    out.extend_from_slice(&(parts.len() as u32).to_be_bytes()[1..]);
    for (chunk, part) in encoded.iter().zip(parts) {
        out.extend_from_slice(&(chunk.len() as u32).to_be_bytes());
        out.extend_from_slice(&(part.len() as u32).to_be_bytes());
        out.extend_from_slice(&md5(chunk));
    }
    for chunk in &encoded {
        out.extend_from_slice(chunk);
    }
    out
}
