//! BLTE error types

use thiserror::Error;

/// BLTE decode error
#[derive(Debug, Error)]
pub enum BlteError {
    /// Invalid BLTE magic bytes
    #[error("invalid BLTE magic: expected [42 4C 54 45], got {0:02X?}")]
    InvalidMagic([u8; 4]),

    /// Header size does not match the chunk table it announces
    #[error("invalid header size: {0}")]
    InvalidHeaderSize(u32),

    /// Invalid header format
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// Chunk with no mode byte
    #[error("empty chunk {0}")]
    EmptyChunk(usize),

    /// Unknown compression mode
    #[error("unknown compression mode: 0x{0:02X}")]
    UnknownCompressionMode(u8),

    /// Known mode this decoder cannot handle
    #[error("unsupported compression mode: 0x{0:02X}")]
    UnsupportedCompressionMode(u8),

    /// Chunk checksum mismatch
    #[error("chunk {chunk} checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Chunk index
        chunk: usize,
        /// Expected checksum (hex)
        expected: String,
        /// Actual checksum (hex)
        actual: String,
    },

    /// Decoded chunk size differs from the chunk table
    #[error("chunk {chunk} decoded to {actual} bytes, table says {expected}")]
    SizeMismatch {
        /// Chunk index
        chunk: usize,
        /// Size from the chunk table
        expected: u64,
        /// Decoded size
        actual: u64,
    },

    /// Decompression failed
    #[error("decompression failed: {0}")]
    DecompressionFailed(String),

    /// Stream ended before the container was complete
    #[error("BLTE stream truncated: {0}")]
    Truncated(String),

    /// Header structure could not be read
    #[error("header parse error: {0}")]
    BinRw(#[from] binrw::Error),

    /// Bytes after the last chunk
    #[error("{0} trailing bytes after last chunk")]
    TrailingData(usize),
}

/// Result type for BLTE operations
pub type BlteResult<T> = Result<T, BlteError>;
