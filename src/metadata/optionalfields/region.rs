//! Named regions of the output image.
//!
//! The layout planner writes exactly two regions: the out-of-line data referenced by field
//! streams, and the field streams themselves with their interleaved anchors. [`FileRegion`]
//! records where each one ended up.

use strum::{AsRefStr, EnumCount, EnumIter};

/// The regions the layout planner places into an image.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, EnumIter, EnumCount, AsRefStr)]
pub enum Region {
    /// Out-of-line blobs, in the order their field streams were encoded.
    OutOfLineData,
    /// Anchor-free streams followed by anchors interleaved with the streams that use them.
    FieldStreams,
}

impl Region {
    /// Slot index of this region in per-region arrays.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// A region within the image with start and size.
///
/// # Examples
/// ```rust,ignore
/// let outline = FileRegion::new(0, 0x40);
/// let fields = FileRegion::new(0x80, 0x20);
///
/// assert_eq!(outline.end_offset(), 0x40);
/// assert!(fields.contains(0x90));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileRegion {
    /// Start offset in bytes from the beginning of the image.
    pub offset: u64,

    /// Size of the region in bytes.
    pub size: u64,
}

impl FileRegion {
    /// Creates a new FileRegion with the specified offset and size.
    #[must_use]
    pub fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    /// Returns the end offset of this region (offset + size).
    #[must_use]
    pub fn end_offset(&self) -> u64 {
        self.offset + self.size
    }

    /// Checks if this region contains the specified offset.
    #[must_use]
    pub fn contains(&self, offset: u64) -> bool {
        offset >= self.offset && offset < self.end_offset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_region_indices() {
        let indices: Vec<usize> = Region::iter().map(Region::index).collect();
        assert_eq!(indices, (0..Region::COUNT).collect::<Vec<_>>());
        assert_eq!(Region::FieldStreams.as_ref(), "FieldStreams");
    }

    #[test]
    fn test_region_extent() {
        let streams = FileRegion::new(0x80, 0x40);
        assert_eq!(streams.end_offset(), 0xC0);

        assert!(streams.contains(0x80));
        assert!(streams.contains(0xBF));
        assert!(!streams.contains(0xC0));
        assert!(!streams.contains(0x7F));
    }

    #[test]
    fn test_zero_sized_region() {
        let outline = FileRegion::new(0x40, 0);
        assert_eq!(outline.end_offset(), 0x40);
        assert!(!outline.contains(0x40));
    }
}
