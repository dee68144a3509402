//! Where a piece of content lives in a TACT data source

use std::fmt;

use crate::transport::ByteRange;

/// Byte span of one entry inside an archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArchiveSpan {
    /// Offset of the first byte in the archive
    pub offset: u64,
    /// Number of bytes
    pub length: u64,
}

impl ArchiveSpan {
    pub fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    /// Inclusive byte range covering this span, `None` for an empty span
    pub fn byte_range(&self) -> Option<ByteRange> {
        let last = self.offset.checked_add(self.length)?.checked_sub(1)?;
        (self.length > 0).then(|| ByteRange::new(self.offset, last))
    }
}

/// Resolved location of content.
///
/// `archive` is the hex hash of the archive (or of the loose CDN object when
/// no index held the content). When `span` is absent the whole object body
/// is the content. Offset and length can only be present together, which the
/// `Option<ArchiveSpan>` shape enforces.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    archive: String,
    span: Option<ArchiveSpan>,
}

impl Location {
    /// Entry inside an archive, as found through one of its indexes
    pub fn archived(archive: impl Into<String>, offset: u64, length: u64) -> Self {
        Self {
            archive: archive.into(),
            span: Some(ArchiveSpan::new(offset, length)),
        }
    }

    /// Whole CDN object addressed by its own hash
    pub fn whole(archive: impl Into<String>) -> Self {
        Self {
            archive: archive.into(),
            span: None,
        }
    }

    pub fn archive(&self) -> &str {
        &self.archive
    }

    pub fn span(&self) -> Option<ArchiveSpan> {
        self.span
    }

    pub fn offset(&self) -> Option<u64> {
        self.span.map(|s| s.offset)
    }

    pub fn length(&self) -> Option<u64> {
        self.span.map(|s| s.length)
    }

    /// Range to request from the CDN, `None` means an unranged GET
    pub fn byte_range(&self) -> Option<ByteRange> {
        self.span.and_then(|s| s.byte_range())
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.span {
            Some(span) => write!(
                f,
                "{} @ {} (+{} bytes)",
                self.archive, span.offset, span.length
            ),
            None => write!(f, "{} (whole object)", self.archive),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archived_location_range() {
        let location = Location::archived("00112233445566778899aabbccddeeff", 1024, 512);
        assert_eq!(location.offset(), Some(1024));
        assert_eq!(location.length(), Some(512));
        assert_eq!(location.byte_range(), Some(ByteRange::new(1024, 1535)));
        assert_eq!(location.byte_range().map(|r| r.to_string()).as_deref(), Some("1024-1535"));
    }

    #[test]
    fn test_whole_location_has_no_range() {
        let location = Location::whole("deadbeefdeadbeefdeadbeefdeadbeef");
        assert_eq!(location.offset(), None);
        assert_eq!(location.length(), None);
        assert!(location.byte_range().is_none());
        assert_eq!(
            location.to_string(),
            "deadbeefdeadbeefdeadbeefdeadbeef (whole object)"
        );
    }

    #[test]
    fn test_empty_span_has_no_range() {
        assert!(ArchiveSpan::new(10, 0).byte_range().is_none());
        assert!(ArchiveSpan::new(u64::MAX, 2).byte_range().is_none());
    }
}
