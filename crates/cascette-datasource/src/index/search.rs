//! Block map binary search and in-block entry scan

use std::cmp::Ordering;

/// Size and offset fields that follow every key in a block
pub const ENTRY_VALUE_SIZE: usize = 8;

/// One index entry: where the content sits in its archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexEntry {
    /// Encoded size in the archive
    pub length: u32,
    /// Offset in the archive
    pub offset: u32,
}

/// Pick the block that could hold `needle`.
///
/// Returns the block whose first key equals `needle`, or otherwise the
/// rightmost block whose first key sorts below it. `None` when `needle` is
/// smaller than every first key. Keys compare as unsigned byte strings.
/// Never indexes out of bounds, even for an unsorted map.
pub fn find_block<K: AsRef<[u8]>>(block_map: &[K], needle: &[u8]) -> Option<usize> {
    let mut lo = 0usize;
    let mut hi = block_map.len();

    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        match block_map[mid].as_ref().cmp(needle) {
            Ordering::Less => lo = mid + 1,
            Ordering::Greater => hi = mid,
            Ordering::Equal => return Some(mid),
        }
    }

    lo.checked_sub(1)
}

fn split_entry(slot: &[u8], key_size: usize) -> (&[u8], IndexEntry) {
    let (key, value) = slot.split_at(key_size);
    let length = u32::from_be_bytes([value[0], value[1], value[2], value[3]]);
    let offset = u32::from_be_bytes([value[4], value[5], value[6], value[7]]);
    (key, IndexEntry { length, offset })
}

/// Entry slots in a block, stopping at the all-zero key that ends the block
/// and at the last slot that fits completely.
pub fn block_entries(block: &[u8], key_size: usize) -> impl Iterator<Item = (&[u8], IndexEntry)> {
    block
        .chunks_exact(key_size + ENTRY_VALUE_SIZE)
        .map(move |slot| split_entry(slot, key_size))
        .take_while(|(key, _)| key.iter().any(|&b| b != 0))
}

/// Scan one block for `key`.
///
/// A zero key ends the block before it matches, so an all-zero `key` is
/// never found.
pub fn scan_block(block: &[u8], key: &[u8]) -> Option<IndexEntry> {
    if key.is_empty() {
        return None;
    }
    block_entries(block, key.len())
        .find(|(candidate, _)| *candidate == key)
        .map(|(_, entry)| entry)
}
