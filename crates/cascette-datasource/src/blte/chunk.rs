//! Chunk modes and per-chunk decoding

use flate2::read::ZlibDecoder;
use std::io::Read;

use super::error::{BlteError, BlteResult};

/// Upper bound on a single decoded chunk
pub const MAX_CHUNK_SIZE: usize = 256 * 1024 * 1024;

/// BLTE chunk encoding modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompressionMode {
    /// No compression (mode 'N')
    None = b'N',
    /// `ZLib` compression (mode 'Z')
    ZLib = b'Z',
    /// LZ4 compression (mode '4')
    Lz4 = b'4',
    /// Encrypted (mode 'E')
    Encrypted = b'E',
    /// Recursive BLTE frame (mode 'F')
    Frame = b'F',
}

impl CompressionMode {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'N' => Some(Self::None),
            b'Z' => Some(Self::ZLib),
            b'4' => Some(Self::Lz4),
            b'E' => Some(Self::Encrypted),
            b'F' => Some(Self::Frame),
            _ => None,
        }
    }
}

/// Decode one encoded chunk (mode byte followed by payload)
pub fn decode_chunk(index: usize, encoded: &[u8]) -> BlteResult<Vec<u8>> {
    let (&mode_byte, payload) = encoded.split_first().ok_or(BlteError::EmptyChunk(index))?;
    let mode =
        CompressionMode::from_byte(mode_byte).ok_or(BlteError::UnknownCompressionMode(mode_byte))?;

    match mode {
        CompressionMode::None => Ok(payload.to_vec()),
        CompressionMode::ZLib => {
            let mut decoded = Vec::new();
            ZlibDecoder::new(payload)
                .take(MAX_CHUNK_SIZE as u64 + 1)
                .read_to_end(&mut decoded)
                .map_err(|e| {
                    BlteError::DecompressionFailed(format!("zlib chunk {index}: {e}"))
                })?;
            if decoded.len() > MAX_CHUNK_SIZE {
                return Err(BlteError::DecompressionFailed(format!(
                    "chunk {index} exceeds {MAX_CHUNK_SIZE} bytes"
                )));
            }
            Ok(decoded)
        }
        CompressionMode::Lz4 => {
            // 8-byte little-endian decoded size, then one LZ4 block
            if payload.len() < 8 {
                return Err(BlteError::DecompressionFailed(format!(
                    "lz4 chunk {index} missing size header"
                )));
            }
            let mut size_bytes = [0u8; 8];
            size_bytes.copy_from_slice(&payload[..8]);
            let size = usize::try_from(u64::from_le_bytes(size_bytes))
                .ok()
                .filter(|&s| s <= MAX_CHUNK_SIZE)
                .ok_or_else(|| {
                    BlteError::DecompressionFailed(format!("lz4 chunk {index} too large"))
                })?;
            lz4_flex::block::decompress(&payload[8..], size)
                .map_err(|e| BlteError::DecompressionFailed(format!("lz4 chunk {index}: {e}")))
        }
        CompressionMode::Encrypted | CompressionMode::Frame => {
            Err(BlteError::UnsupportedCompressionMode(mode_byte))
        }
    }
}
