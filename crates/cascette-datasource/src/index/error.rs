//! Error types for index parsing and lookup

use thiserror::Error;

/// Index operation result type
pub type IndexResult<T> = Result<T, IndexError>;

/// Reasons an index file cannot be used
#[derive(Debug, Error)]
pub enum IndexError {
    /// Index file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No checksum width passed both the self-description and the name check
    #[error("could not find checksum size in index {0}")]
    ChecksumSizeNotFound(String),

    /// Table of contents does not end where the footer starts
    #[error("could not place toc in index {index}: toc ends at {toc_end}, footer starts at {footer_start}")]
    TocPlacement {
        /// Index name
        index: String,
        /// Computed end of the table of contents
        toc_end: i64,
        /// Offset of the footer
        footer_start: u64,
    },

    /// Fewer bytes than the footer needs
    #[error("index too short: need {needed} bytes, have {actual}")]
    Truncated {
        /// Bytes required
        needed: usize,
        /// Bytes available
        actual: usize,
    },

    /// Footer declares a key width that cannot be searched
    #[error("invalid key size: {0}")]
    InvalidKeySize(u8),

    /// Block number outside the block map
    #[error("block {block} out of range ({count} blocks)")]
    BlockOutOfRange {
        /// Requested block
        block: usize,
        /// Blocks in the index
        count: usize,
    },
}

impl IndexError {
    /// True for structural problems with the file, as opposed to I/O failures
    pub fn is_format_error(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}
