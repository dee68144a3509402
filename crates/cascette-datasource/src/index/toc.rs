//! Table of contents placement
//!
//! An index is `B` fixed-size blocks, then a table of contents of
//! `B * key_size + (B - 1) * checksum_size` bytes, then the footer. Nothing
//! in the file stores `B`; it is recovered from the file length.

/// Fixed block size of archive indexes
pub const BLOCK_SIZE: u64 = 4096;

/// Size of the table of contents for `blocks` blocks.
///
/// Signed because zero blocks gives `-checksum_size`.
pub fn toc_size(key_size: u8, checksum_size: u8, blocks: i64) -> i64 {
    blocks * i64::from(key_size) + (blocks - 1) * i64::from(checksum_size)
}

/// Where the blocks and table of contents sit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TocPlacement {
    /// Number of entry blocks
    pub block_count: u64,
    /// Offset of the table of contents
    pub toc_offset: u64,
    /// Size of the table of contents
    pub toc_size: u64,
}

/// Result of trying to fit blocks and TOC in front of the footer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// The TOC ends exactly at the footer
    Placed(TocPlacement),
    /// The largest fitting block count leaves a gap before the footer
    Gap {
        /// End of the table of contents for the chosen block count
        toc_end: i64,
    },
}

/// Find the block count for an index whose footer starts at `footer_start`.
///
/// Starts from `footer_start / BLOCK_SIZE` and steps down until blocks plus
/// TOC fit. The fit must be exact.
pub fn place_toc(footer_start: u64, key_size: u8, checksum_size: u8) -> Placement {
    let limit = i64::try_from(footer_start).unwrap_or(i64::MAX);
    let block = BLOCK_SIZE as i64;
    let end_for = |blocks: i64| blocks * block + toc_size(key_size, checksum_size, blocks);

    let mut blocks = limit / block;
    while blocks > 0 && end_for(blocks) > limit {
        blocks -= 1;
    }

    let toc_end = end_for(blocks);
    if toc_end != limit {
        return Placement::Gap { toc_end };
    }

    let size = toc_size(key_size, checksum_size, blocks);
    match (u64::try_from(blocks), u64::try_from(size)) {
        (Ok(block_count), Ok(toc_size)) => Placement::Placed(TocPlacement {
            block_count,
            toc_offset: block_count * BLOCK_SIZE,
            toc_size,
        }),
        _ => Placement::Gap { toc_end },
    }
}
