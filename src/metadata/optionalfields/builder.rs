//! Build-time accumulation of one descriptor's optional fields.
//!
//! A [`FieldSetBuilder`] collects the fields declared for a single descriptor. It does not encode
//! anything itself: once all fields are set it is handed, by value, to
//! [`crate::metadata::optionalfields::LayoutPlanner::encode_fields`], which places any out-of-line
//! blobs and produces the final field stream. Moving the builder into the planner is what makes it
//! immutable after encoding.
//!
//! Out-of-line values are [`OutlineBlob`]s shared through [`OutlineBlobRc`]. The builder only
//! references them; the blob content is copied into the out-of-line region by the planner, and a
//! blob can be placed exactly once.
//!
//! # Examples
//!
//! ```rust
//! use optfields::prelude::*;
//!
//! let slots = OutlineBlob::new(vec![0u8; 12], 4);
//!
//! let mut builder = FieldSetBuilder::new();
//! builder
//!     .add_rare_flags(RareFlags::HAS_SEALED_VTABLE_ENTRIES)
//!     .add_sealed_virtual_slots(slots);
//!
//! assert_eq!(builder.len(), 2);
//! assert!(builder.contains_outline_fields());
//! ```

use std::sync::{Arc, OnceLock};

use strum::{EnumCount, IntoEnumIterator};

use crate::metadata::optionalfields::tag::OptionalFieldTag;

/// Reference counted pointer to an [`OutlineBlob`]
pub type OutlineBlobRc = Arc<OutlineBlob>;

/// An opaque payload stored out-of-line.
///
/// The planner never interprets the content. It only needs the bytes and the alignment the blob
/// has to be placed at.
#[derive(Debug)]
pub struct OutlineBlob {
    data: Vec<u8>,
    alignment: u32,
    placement: OnceLock<u32>,
}

impl OutlineBlob {
    /// Creates a new, unplaced blob.
    ///
    /// # Arguments
    /// * `data` - The blob content
    /// * `alignment` - Required alignment of the content (a power of two)
    #[must_use]
    pub fn new(data: Vec<u8>, alignment: u32) -> OutlineBlobRc {
        debug_assert!(alignment.is_power_of_two(), "blob alignment {alignment}");

        Arc::new(OutlineBlob {
            data,
            alignment,
            placement: OnceLock::new(),
        })
    }

    /// The blob content.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Required alignment of the blob.
    #[must_use]
    pub fn alignment(&self) -> u32 {
        self.alignment
    }

    /// Size of the blob content in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the blob has no content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` once a planner has copied the blob into its out-of-line region.
    #[must_use]
    pub fn is_placed(&self) -> bool {
        self.placement.get().is_some()
    }

    /// Offset of the placed copy within the out-of-line region.
    #[must_use]
    pub fn placed_offset(&self) -> Option<u32> {
        self.placement.get().copied()
    }

    /// Records the placement, returning `false` if the blob was already placed.
    pub(crate) fn mark_placed(&self, offset: u32) -> bool {
        self.placement.set(offset).is_ok()
    }
}

/// Value of a single optional field.
#[derive(Debug, Clone)]
pub enum FieldValue {
    /// Raw value of an inline field.
    Inline(u32),
    /// Blob referenced by an out-of-line field.
    OutOfLine(OutlineBlobRc),
}

/// One present field of a [`FieldSetBuilder`].
#[derive(Debug, Clone)]
pub struct OptionalField {
    /// The field value
    pub value: FieldValue,
    /// Offset of the blob copy within the out-of-line region, set by the planner when the blob is
    /// placed. Always `None` for inline fields.
    pub offset: Option<u32>,
}

/// Accumulates the optional fields of one descriptor before encoding.
///
/// Fields are kept in a fixed array with one slot per [`OptionalFieldTag`]. Setting a tag that is
/// already present overwrites the previous value: the last write wins.
#[derive(Debug, Clone)]
pub struct FieldSetBuilder {
    fields: [Option<OptionalField>; OptionalFieldTag::COUNT],
    contains_outline: bool,
}

impl Default for FieldSetBuilder {
    fn default() -> Self {
        FieldSetBuilder {
            fields: std::array::from_fn(|_| None),
            contains_outline: false,
        }
    }
}

impl FieldSetBuilder {
    /// Creates a builder with no fields.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_inline_field(&mut self, tag: OptionalFieldTag, value: u32) -> &mut Self {
        debug_assert!(tag.is_inline(), "{} is not an inline field", tag.as_ref());

        self.fields[tag.index()] = Some(OptionalField {
            value: FieldValue::Inline(value),
            offset: None,
        });
        self
    }

    pub(crate) fn add_outline_field(
        &mut self,
        tag: OptionalFieldTag,
        blob: OutlineBlobRc,
    ) -> &mut Self {
        debug_assert!(!blob.is_placed(), "{} blob was already placed", tag.as_ref());
        debug_assert!(
            tag.outline_alignment()
                .is_some_and(|alignment| alignment % blob.alignment() == 0),
            "{} cannot hold a blob aligned to {}",
            tag.as_ref(),
            blob.alignment()
        );

        self.fields[tag.index()] = Some(OptionalField {
            value: FieldValue::OutOfLine(blob),
            offset: None,
        });
        self.contains_outline = true;
        self
    }

    /// Sets `tag` from a raw value.
    ///
    /// Inline tags take the value as is; this is the untyped counterpart of the generated
    /// `add_*` setters.
    pub fn set(&mut self, tag: OptionalFieldTag, value: FieldValue) -> &mut Self {
        match value {
            FieldValue::Inline(raw) => self.add_inline_field(tag, raw),
            FieldValue::OutOfLine(blob) => self.add_outline_field(tag, blob),
        }
    }

    /// Number of fields present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.iter().filter(|field| field.is_some()).count()
    }

    /// Returns `true` if no field was set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.iter().all(Option::is_none)
    }

    /// Returns `true` if at least one out-of-line field was set.
    #[must_use]
    pub fn contains_outline_fields(&self) -> bool {
        self.contains_outline
    }

    /// The field stored for `tag`, if present.
    #[must_use]
    pub fn get(&self, tag: OptionalFieldTag) -> Option<&OptionalField> {
        self.fields[tag.index()].as_ref()
    }

    /// Iterates over the present fields in tag declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (OptionalFieldTag, &OptionalField)> + '_ {
        OptionalFieldTag::iter()
            .filter_map(|tag| self.fields[tag.index()].as_ref().map(|field| (tag, field)))
    }

    pub(crate) fn iter_mut(
        &mut self,
    ) -> impl Iterator<Item = (OptionalFieldTag, &mut OptionalField)> + '_ {
        OptionalFieldTag::iter()
            .zip(self.fields.iter_mut())
            .filter_map(|(tag, field)| field.as_mut().map(|field| (tag, field)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::optionalfields::tag::RareFlags;

    #[test]
    fn test_empty_builder() {
        let builder = FieldSetBuilder::new();
        assert!(builder.is_empty());
        assert_eq!(builder.len(), 0);
        assert!(!builder.contains_outline_fields());
        assert_eq!(builder.iter().count(), 0);
    }

    #[test]
    fn test_inline_fields() {
        let mut builder = FieldSetBuilder::new();
        builder
            .add_nullable_value_offset(8)
            .add_rare_flags(RareFlags::HAS_CCTOR);

        assert_eq!(builder.len(), 2);
        assert!(!builder.contains_outline_fields());

        let tags: Vec<_> = builder.iter().map(|(tag, _)| tag).collect();
        assert_eq!(
            tags,
            [OptionalFieldTag::RareFlags, OptionalFieldTag::NullableValueOffset]
        );

        let field = builder.get(OptionalFieldTag::NullableValueOffset).unwrap();
        assert!(matches!(field.value, FieldValue::Inline(8)));
        assert!(field.offset.is_none());
    }

    #[test]
    fn test_same_tag_overwrites() {
        let mut builder = FieldSetBuilder::new();
        builder.add_dispatch_map(1).add_dispatch_map(2);

        assert_eq!(builder.len(), 1);
        assert!(matches!(
            builder.get(OptionalFieldTag::DispatchMap).unwrap().value,
            FieldValue::Inline(2)
        ));
    }

    #[test]
    fn test_outline_fields() {
        let blob = OutlineBlob::new(vec![1, 2, 3, 4, 5, 6, 7, 8], 8);
        let mut builder = FieldSetBuilder::new();
        builder.add_generic_composition(blob.clone());

        assert!(builder.contains_outline_fields());
        assert!(!blob.is_placed());
        assert_eq!(Arc::strong_count(&blob), 2);

        match &builder.get(OptionalFieldTag::GenericComposition).unwrap().value {
            FieldValue::OutOfLine(stored) => assert!(Arc::ptr_eq(stored, &blob)),
            FieldValue::Inline(_) => panic!("expected an out-of-line value"),
        }
    }

    #[test]
    fn test_untyped_set() {
        let mut builder = FieldSetBuilder::new();
        builder.set(OptionalFieldTag::ICastableIsInstSlot, FieldValue::Inline(7));
        builder.set(
            OptionalFieldTag::SealedVirtualSlots,
            FieldValue::OutOfLine(OutlineBlob::new(vec![0; 4], 4)),
        );

        assert_eq!(builder.len(), 2);
        assert!(builder.contains_outline_fields());
    }

    #[test]
    fn test_blob_placement_once() {
        let blob = OutlineBlob::new(vec![0; 4], 4);
        assert_eq!(blob.placed_offset(), None);
        assert!(blob.mark_placed(16));
        assert!(!blob.mark_placed(32));
        assert_eq!(blob.placed_offset(), Some(16));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "already placed")]
    fn test_placed_blob_rejected() {
        let blob = OutlineBlob::new(vec![0; 4], 4);
        blob.mark_placed(0);
        FieldSetBuilder::new().add_sealed_virtual_slots(blob);
    }
}
