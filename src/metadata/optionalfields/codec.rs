//! Encoding and decoding of individual field streams.
//!
//! A field stream is a sequence of fields, each made of a header byte followed by a
//! [`varint`](crate::metadata::optionalfields::varint) value:
//!
//! ```text
//!  7   6                 0
//! +---+-------------------+------------------+
//! | L |        tag        | value (1-5 bytes)|
//! +---+-------------------+------------------+
//! ```
//!
//! `L` is set on the final field of the stream. Inline fields store their value directly. For
//! out-of-line fields the value is a delta: the distance from the stream's anchor to the referenced
//! blob, divided by the blob alignment. The anchor is found by masking the stream's own address
//! down to the anchor alignment and reading the full-width address stored there.
//!
//! Lookups scan the stream from the start. Streams hold only a handful of fields, so no index is
//! kept.

use crate::{
    file::parser::Parser,
    metadata::optionalfields::{
        image::Image,
        tag::{OptionalFieldTag, LAST_FIELD_FLAG, TAG_MASK},
        varint,
    },
    Error, Result,
};

/// Appends one field (header byte and value) to `buffer`.
///
/// The value is written as given: any delta computation for out-of-line fields has already been
/// performed by the caller. Returns the number of bytes written.
pub fn encode_field(
    buffer: &mut Vec<u8>,
    tag: OptionalFieldTag,
    is_last: bool,
    value: u32,
) -> usize {
    buffer.push(tag.header(is_last));
    1 + varint::encode(value, buffer)
}

/// Returns the number of bytes [`encode_field`] writes for `value`.
#[must_use]
pub fn field_size(value: u32) -> usize {
    1 + varint::encoding_size(value)
}

/// Reads a field header, returning the tag and whether it is the last field of the stream.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if the stream is exhausted or
/// [`crate::Error::UnknownTag`] if the header names a tag outside the tag set.
pub fn decode_tag(parser: &mut Parser) -> Result<(OptionalFieldTag, bool)> {
    let header = parser.read_le::<u8>()?;
    let raw_tag = header & TAG_MASK;
    let tag = OptionalFieldTag::from_repr(raw_tag).ok_or(Error::UnknownTag(raw_tag))?;

    Ok((tag, header & LAST_FIELD_FLAG != 0))
}

/// Reads a field value following its header.
///
/// # Errors
///
/// Returns an error if the value encoding is truncated or malformed.
pub fn decode_value(parser: &mut Parser) -> Result<u32> {
    parser.read_varint()
}

/// Read-only view of one descriptor's optional fields inside a placed [`Image`].
///
/// The view wraps the descriptor's nullable field stream reference. A `None` reference means the
/// descriptor has no optional fields: every inline accessor returns its default and every
/// out-of-line accessor returns `None`, without touching the image.
///
/// Views borrow immutable data and can be shared freely between threads.
///
/// # Examples
///
/// ```rust
/// use optfields::prelude::*;
///
/// let mut planner = LayoutPlanner::new(LayoutConfig::default())?;
/// let mut builder = FieldSetBuilder::new();
/// builder.add_dispatch_map(42);
///
/// let handle = planner.encode_fields(builder)?;
/// let image = planner.place()?;
///
/// let fields = image.optional_fields(image.resolve(handle));
/// assert_eq!(fields.dispatch_map(0)?, 42);
/// assert_eq!(fields.nullable_value_offset(3)?, 3);
/// # Ok::<(), optfields::Error>(())
/// ```
#[derive(Clone, Copy, Debug)]
pub struct OptionalFields<'a> {
    image: &'a Image,
    address: Option<u64>,
}

impl<'a> OptionalFields<'a> {
    /// Creates a view over the field stream at `address` (or an empty view for `None`).
    #[must_use]
    pub fn new(image: &'a Image, address: Option<u64>) -> Self {
        OptionalFields { image, address }
    }

    /// Address of the field stream, `None` if the descriptor has no optional fields.
    #[must_use]
    pub fn address(&self) -> Option<u64> {
        self.address
    }

    /// Returns `true` if the descriptor has no field stream.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.address.is_none()
    }

    /// Scans the stream for `tag`, returning its raw value if present.
    fn find(&self, tag: OptionalFieldTag) -> Result<Option<u32>> {
        let Some(address) = self.address else {
            return Ok(None);
        };

        let mut parser = Parser::new(self.image.slice_from(address)?);
        loop {
            let (current, is_last) = decode_tag(&mut parser)?;
            let value = decode_value(&mut parser)?;
            if current == tag {
                return Ok(Some(value));
            }
            if is_last {
                return Ok(None);
            }
        }
    }

    /// Returns the raw value of an inline field, or `default` if it is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is malformed.
    pub fn get_inline_field(&self, tag: OptionalFieldTag, default: u32) -> Result<u32> {
        debug_assert!(tag.is_inline(), "{} is not an inline field", tag.as_ref());

        Ok(self.find(tag)?.unwrap_or(default))
    }

    /// Returns the address of an out-of-line field's blob, or `None` if it is absent.
    ///
    /// `alignment` is the fixed alignment of the tag's blob; the stored delta is scaled by it and
    /// added to the anchor governing this stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is malformed or the anchor cannot be read.
    pub fn get_outline_field(&self, tag: OptionalFieldTag, alignment: u32) -> Result<Option<u64>> {
        debug_assert_eq!(tag.outline_alignment(), Some(alignment));

        let (Some(address), Some(delta)) = (self.address, self.find(tag)?) else {
            return Ok(None);
        };

        let anchor = self.image.read_anchor(self.image.anchor_address(address))?;
        let target = anchor
            .checked_add(u64::from(delta) * u64::from(alignment))
            .ok_or_else(|| {
                malformed_error!("Out-of-line delta {} overflows anchor {:#x}", delta, anchor)
            })?;

        Ok(Some(target))
    }

    /// Decodes every field of the stream in stream order.
    ///
    /// Out-of-line fields are returned with their raw delta.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is malformed.
    pub fn raw_fields(&self) -> Result<Vec<(OptionalFieldTag, u32)>> {
        let mut fields = Vec::new();
        let Some(address) = self.address else {
            return Ok(fields);
        };

        let mut parser = Parser::new(self.image.slice_from(address)?);
        loop {
            let (tag, is_last) = decode_tag(&mut parser)?;
            fields.push((tag, decode_value(&mut parser)?));
            if is_last {
                return Ok(fields);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{metadata::optionalfields::tag::RareFlags, test::*};

    #[test]
    fn test_encode_field_layout() {
        let mut buffer = Vec::new();
        let written = encode_field(&mut buffer, OptionalFieldTag::DispatchMap, false, 5);
        assert_eq!(written, 2);
        assert_eq!(buffer, [OptionalFieldTag::DispatchMap as u8, 0x28]);

        let written = encode_field(&mut buffer, OptionalFieldTag::RareFlags, true, 1000);
        assert_eq!(written, field_size(1000));
        assert_eq!(buffer[2], OptionalFieldTag::RareFlags as u8 | LAST_FIELD_FLAG);
    }

    #[test]
    fn test_decode_round_trip() {
        let mut buffer = Vec::new();
        encode_field(&mut buffer, OptionalFieldTag::NullableValueOffset, false, 8);
        encode_field(&mut buffer, OptionalFieldTag::ThreadStaticInfo, true, u32::MAX);

        let mut parser = Parser::new(&buffer);
        assert_eq!(
            decode_tag(&mut parser).unwrap(),
            (OptionalFieldTag::NullableValueOffset, false)
        );
        assert_eq!(decode_value(&mut parser).unwrap(), 8);
        assert_eq!(
            decode_tag(&mut parser).unwrap(),
            (OptionalFieldTag::ThreadStaticInfo, true)
        );
        assert_eq!(decode_value(&mut parser).unwrap(), u32::MAX);
        assert!(!parser.has_more_data());
    }

    #[test]
    fn test_decode_unknown_tag() {
        let data = [0x7E, 0x00];
        let mut parser = Parser::new(&data);
        assert!(matches!(decode_tag(&mut parser), Err(Error::UnknownTag(0x7E))));
    }

    #[test]
    fn test_lookups_across_many_streams() {
        let mut planner = create_planner();
        let inline = planner.encode_fields(create_inline_builder(77)).unwrap();
        let encoded = encode_mixed(&mut planner, 300);
        let image = planner.place().unwrap();

        let fields = image.optional_fields(image.resolve(inline));
        assert_eq!(fields.dispatch_map(0).unwrap(), 77);
        assert!(fields.rare_flags(RareFlags::empty()).unwrap().contains(RareFlags::HAS_CCTOR));

        for (seed, handle, blobs) in encoded {
            let fields = image.optional_fields(image.resolve(Some(handle)));
            assert_eq!(fields.dispatch_map(u32::MAX).unwrap(), seed);

            let padding = fields.value_type_field_padding(0).unwrap();
            if seed % 2 == 0 {
                assert_eq!(padding, seed.wrapping_mul(0x9E37_79B9));
            } else {
                assert_eq!(padding, 0);
            }

            let addresses = [
                fields.sealed_virtual_slots().unwrap(),
                fields.generic_composition().unwrap(),
                fields.thread_static_info().unwrap(),
            ];
            let present: Vec<u64> = addresses.into_iter().flatten().collect();
            assert_eq!(present.len(), blobs.len());

            for (address, blob) in present.into_iter().zip(&blobs) {
                assert_eq!(address, TEST_IMAGE_BASE + u64::from(blob.placed_offset().unwrap()));
                assert_eq!(address % u64::from(blob.alignment()), 0);
                assert_eq!(image.read(address, blob.len()).unwrap(), blob.data());
            }
        }
    }

    #[test]
    fn test_null_view() {
        let image = create_planner().place().unwrap();
        let fields = OptionalFields::new(&image, None);
        assert!(fields.is_null());
        assert_eq!(fields.icastable_is_inst_slot(0xFFFF).unwrap(), 0xFFFF);
        assert_eq!(fields.thread_static_info().unwrap(), None);
        assert!(fields.raw_fields().unwrap().is_empty());
    }

    #[test]
    fn test_view_outside_image() {
        let image = create_planner().place().unwrap();
        let fields = image.optional_fields(Some(0x10));
        assert!(matches!(fields.dispatch_map(0), Err(Error::InvalidAddress(0x10))));
    }

    #[test]
    fn test_decode_truncated_value() {
        let data = [OptionalFieldTag::DispatchMap as u8 | LAST_FIELD_FLAG];
        let mut parser = Parser::new(&data);
        decode_tag(&mut parser).unwrap();
        assert!(matches!(decode_value(&mut parser), Err(Error::OutOfBounds)));
    }
}
