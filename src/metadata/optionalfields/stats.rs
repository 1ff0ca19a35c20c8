//! Statistics collected while laying out optional fields.

use std::fmt;

use strum::{EnumCount, IntoEnumIterator};

use crate::metadata::optionalfields::{builder::FieldSetBuilder, tag::OptionalFieldTag};

/// Number of buckets in [`LayoutStats::size_distribution`]; the last one collects every stream of
/// this size or larger.
pub const SIZE_BUCKETS: usize = 8;

/// Counters describing the streams a [`crate::metadata::optionalfields::LayoutPlanner`] produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutStats {
    /// Number of field streams encoded
    pub streams: u32,
    /// Number of streams containing each tag, indexed by [`OptionalFieldTag::index`]
    pub field_counts: [u32; OptionalFieldTag::COUNT],
    /// Stream sizes: bucket `n` counts streams of `n + 1` bytes
    pub size_distribution: [u32; SIZE_BUCKETS],
    /// Number of anchors emitted
    pub anchors: u32,
    /// Bytes left unused at the end of anchor groups closed because the next stream did not fit
    pub padding_bytes: u64,
    /// Bytes of out-of-line data, including alignment gaps
    pub outline_bytes: u64,
}

impl LayoutStats {
    pub(crate) fn record_stream(&mut self, builder: &FieldSetBuilder, size: usize) {
        self.streams += 1;
        for (tag, _) in builder.iter() {
            self.field_counts[tag.index()] += 1;
        }

        let bucket = size.clamp(1, SIZE_BUCKETS) - 1;
        self.size_distribution[bucket] += 1;
    }

    /// Number of streams containing `tag`.
    #[must_use]
    pub fn field_count(&self, tag: OptionalFieldTag) -> u32 {
        self.field_counts[tag.index()]
    }

    /// Total bytes spent on anchors.
    #[must_use]
    pub fn anchor_bytes(&self) -> u64 {
        u64::from(self.anchors) * super::config::ANCHOR_SIZE
    }
}

impl fmt::Display for LayoutStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} field streams, {} anchors, {} padding bytes, {} out-of-line bytes",
            self.streams, self.anchors, self.padding_bytes, self.outline_bytes
        )?;

        for tag in OptionalFieldTag::iter() {
            writeln!(f, "  {:<26} {}", tag.as_ref(), self.field_count(tag))?;
        }

        for (bucket, count) in self.size_distribution.iter().enumerate() {
            let suffix = if bucket + 1 == SIZE_BUCKETS { "+" } else { "" };
            writeln!(f, "  {:>2}{:<1} bytes {}", bucket + 1, suffix, count)?;
        }

        Ok(())
    }
}
