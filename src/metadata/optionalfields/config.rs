//! Layout configuration and its validation.

use crate::{
    metadata::optionalfields::tag::{MAX_OUTLINE_ALIGNMENT, MAX_STREAM_SIZE},
    Error, Result,
};

/// Size of an anchor: one full-width address.
pub const ANCHOR_SIZE: u64 = 8;

/// Tuning parameters of the optional field layout.
///
/// Anchors are placed at multiples of `1 << header_alignment_shift` within the field stream
/// region. A larger alignment means fewer anchors (and fewer relocations) but more out-of-line
/// data per anchor, so deltas grow. With the varint size classes, a 2-byte delta already covers
/// 1024 alignment units (4 KiB of 4-byte aligned data); spacing anchors more densely than that
/// buys nothing.
///
/// The alignment must:
/// - exceed [`ANCHOR_SIZE`] and leave room after the anchor for the largest possible stream
/// - be at least the largest out-of-line blob alignment
/// - divide `image_base`, so that masking an address finds its anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutConfig {
    /// log2 of the anchor alignment (default: 7, i.e. 128 bytes)
    pub header_alignment_shift: u32,

    /// Address the placed image is loaded at (default: `0x1000_0000`)
    pub image_base: u64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            header_alignment_shift: 7,
            image_base: 0x1000_0000,
        }
    }
}

impl LayoutConfig {
    /// Sets the anchor alignment shift.
    #[must_use]
    pub fn with_header_alignment_shift(mut self, shift: u32) -> Self {
        self.header_alignment_shift = shift;
        self
    }

    /// Sets the image base address.
    #[must_use]
    pub fn with_image_base(mut self, image_base: u64) -> Self {
        self.image_base = image_base;
        self
    }

    /// Alignment of anchors in bytes.
    #[must_use]
    pub fn header_alignment_bytes(&self) -> u64 {
        1_u64 << self.header_alignment_shift
    }

    /// Mask selecting the offset of an address within its anchor group.
    #[must_use]
    pub fn header_alignment_mask(&self) -> u64 {
        self.header_alignment_bytes() - 1
    }

    /// Checks the configuration against the layout constraints.
    ///
    /// # Errors
    /// Returns [`crate::Error::Configuration`] describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if self.header_alignment_shift >= 32 {
            return Err(Error::Configuration(format!(
                "anchor alignment shift {} is too large",
                self.header_alignment_shift
            )));
        }

        let alignment = self.header_alignment_bytes();
        if alignment <= ANCHOR_SIZE {
            return Err(Error::Configuration(format!(
                "anchor alignment {alignment} must exceed the anchor size {ANCHOR_SIZE}"
            )));
        }

        if alignment - ANCHOR_SIZE < MAX_STREAM_SIZE as u64 {
            return Err(Error::Configuration(format!(
                "anchor alignment {alignment} leaves no room for a {MAX_STREAM_SIZE} byte field stream"
            )));
        }

        if alignment < u64::from(MAX_OUTLINE_ALIGNMENT) {
            return Err(Error::Configuration(format!(
                "anchor alignment {alignment} is below the out-of-line alignment {MAX_OUTLINE_ALIGNMENT}"
            )));
        }

        if self.image_base & self.header_alignment_mask() != 0 {
            return Err(Error::Configuration(format!(
                "image base {:#x} is not aligned to {alignment}",
                self.image_base
            )));
        }

        Ok(())
    }
}
