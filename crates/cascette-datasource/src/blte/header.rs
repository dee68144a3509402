//! BLTE preamble and chunk table parsing

use binrw::BinRead;
use binrw::io::Cursor;

use super::error::{BlteError, BlteResult};

/// BLTE magic bytes
pub const BLTE_MAGIC: [u8; 4] = *b"BLTE";

/// Magic plus big-endian header size
pub const PREAMBLE_SIZE: usize = 8;

/// Flags byte selecting the chunk table entry layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TableFlags {
    /// Standard chunk info (24 bytes per chunk)
    Standard = 0x0F,
    /// Extended chunk info (40 bytes per chunk)
    Extended = 0x10,
}

impl TableFlags {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x0F => Some(Self::Standard),
            0x10 => Some(Self::Extended),
            _ => None,
        }
    }

    /// Size of each chunk info entry
    pub fn entry_size(self) -> usize {
        match self {
            Self::Standard => 24,
            Self::Extended => 40,
        }
    }
}

/// Fixed 8 bytes in front of every BLTE stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead)]
#[br(big)]
pub struct Preamble {
    pub magic: [u8; 4],
    /// 0 for a single chunk, otherwise the full header length
    pub header_size: u32,
}

/// One row of the chunk table
#[derive(Debug, Clone, PartialEq, Eq, BinRead)]
#[br(big, import(flags: TableFlags))]
pub struct ChunkInfo {
    /// Encoded size including the mode byte
    pub compressed_size: u32,
    /// Size after decoding
    pub decompressed_size: u32,
    /// MD5 of the encoded chunk
    pub checksum: [u8; 16],
    /// MD5 of the decoded chunk (extended tables only)
    #[br(if(flags == TableFlags::Extended))]
    pub decompressed_checksum: Option<[u8; 16]>,
}

/// Chunk table following the preamble of a multi-chunk stream
#[derive(Debug, Clone, BinRead)]
#[br(big)]
pub struct ChunkTable {
    #[br(try_map = |x: u8| TableFlags::from_byte(x).ok_or_else(|| format!("unknown table flags 0x{x:02X}")))]
    pub flags: TableFlags,

    /// 24-bit chunk count
    #[br(map = |x: [u8; 3]| u32::from_be_bytes([0, x[0], x[1], x[2]]))]
    pub chunk_count: u32,

    #[br(count = chunk_count, args { inner: (flags,) })]
    pub chunks: Vec<ChunkInfo>,
}

/// Parse the 8-byte preamble and return the header size field.
///
/// A header size of zero marks a single-chunk file; otherwise the value
/// counts the whole header including these 8 bytes.
pub fn parse_preamble(preamble: &[u8]) -> BlteResult<u32> {
    if preamble.len() < PREAMBLE_SIZE {
        return Err(BlteError::Truncated(format!(
            "preamble needs {PREAMBLE_SIZE} bytes, have {}",
            preamble.len()
        )));
    }

    let preamble = Preamble::read(&mut Cursor::new(preamble))?;
    if preamble.magic != BLTE_MAGIC {
        return Err(BlteError::InvalidMagic(preamble.magic));
    }

    let header_size = preamble.header_size;
    if header_size != 0 && (header_size as usize) < PREAMBLE_SIZE + 4 {
        return Err(BlteError::InvalidHeaderSize(header_size));
    }
    Ok(header_size)
}

/// Parse the chunk table that follows the preamble.
///
/// `table` must hold exactly `header_size - 8` bytes.
pub fn parse_chunk_table(table: &[u8], header_size: u32) -> BlteResult<Vec<ChunkInfo>> {
    let mut cursor = Cursor::new(table);
    let parsed = ChunkTable::read(&mut cursor).map_err(|e| {
        if e.is_eof() {
            BlteError::InvalidHeaderSize(header_size)
        } else {
            BlteError::from(e)
        }
    })?;

    if parsed.chunks.is_empty() {
        return Err(BlteError::InvalidHeader("chunk table is empty".to_string()));
    }
    if cursor.position() != table.len() as u64 {
        return Err(BlteError::InvalidHeaderSize(header_size));
    }

    Ok(parsed.chunks)
}
