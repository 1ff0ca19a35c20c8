//! Optional fields for descriptors constructed at run time.
//!
//! Descriptors built dynamically do not go through the layout planner: there are no shared
//! anchors and no delta compression. [`RuntimeFieldBuilder`] produces a self-contained stream
//! where inline fields use the regular header and varint encoding, and out-of-line fields store
//! the full 8-byte little-endian pointer directly after their header.
//!
//! Streams written here are read back with [`RuntimeFieldBuilder::decode`].

use strum::{EnumCount, IntoEnumIterator};

use crate::{
    file::parser::Parser,
    metadata::optionalfields::{
        codec::{decode_tag, decode_value, encode_field, field_size},
        tag::OptionalFieldTag,
    },
    Result,
};

/// Size of a raw pointer stored for an out-of-line field.
const POINTER_SIZE: usize = 8;

/// Value of a field in a [`RuntimeFieldBuilder`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RuntimeValue {
    /// Raw value of an inline field.
    Inline(u32),
    /// Address of the data referenced by an out-of-line field.
    Pointer(u64),
}

/// Encoder/decoder for optional fields of run-time built descriptors.
///
/// Each tag has a fixed slot, present or not. Instances are cheap and short lived: fill one,
/// encode it, throw it away, or decode an existing stream into one to inspect or modify it.
///
/// # Examples
///
/// ```rust
/// use optfields::prelude::*;
///
/// let mut builder = RuntimeFieldBuilder::new();
/// builder
///     .set(OptionalFieldTag::DispatchMap, RuntimeValue::Inline(3))
///     .set(OptionalFieldTag::GenericComposition, RuntimeValue::Pointer(0x7FF0_1000));
///
/// let mut stream = Vec::new();
/// let written = builder.encode(&mut stream);
/// assert_eq!(written, builder.encoding_size());
///
/// let decoded = RuntimeFieldBuilder::from_stream(Some(&stream))?;
/// assert_eq!(decoded.pointer(OptionalFieldTag::GenericComposition), Some(0x7FF0_1000));
/// # Ok::<(), optfields::Error>(())
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RuntimeFieldBuilder {
    fields: [Option<RuntimeValue>; OptionalFieldTag::COUNT],
}

impl Default for RuntimeFieldBuilder {
    fn default() -> Self {
        RuntimeFieldBuilder {
            fields: [None; OptionalFieldTag::COUNT],
        }
    }
}

impl RuntimeFieldBuilder {
    /// Creates a builder with no fields present.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes `source` into a new builder. `None` yields a builder with no fields.
    ///
    /// # Errors
    /// Returns an error if the stream is truncated or names an unknown tag.
    pub fn from_stream(source: Option<&[u8]>) -> Result<Self> {
        let mut builder = Self::new();
        builder.decode(source)?;
        Ok(builder)
    }

    /// Sets `tag` to `value`, replacing any previous value.
    pub fn set(&mut self, tag: OptionalFieldTag, value: RuntimeValue) -> &mut Self {
        debug_assert_eq!(
            tag.is_inline(),
            matches!(value, RuntimeValue::Inline(_)),
            "value kind does not match {}",
            tag.as_ref()
        );

        self.fields[tag.index()] = Some(value);
        self
    }

    /// Removes `tag`.
    pub fn clear(&mut self, tag: OptionalFieldTag) -> &mut Self {
        self.fields[tag.index()] = None;
        self
    }

    /// The value stored for `tag`, if present.
    #[must_use]
    pub fn get(&self, tag: OptionalFieldTag) -> Option<RuntimeValue> {
        self.fields[tag.index()]
    }

    /// The raw value of inline field `tag`, or `default` if it is absent.
    #[must_use]
    pub fn inline(&self, tag: OptionalFieldTag, default: u32) -> u32 {
        match self.get(tag) {
            Some(RuntimeValue::Inline(value)) => value,
            _ => default,
        }
    }

    /// The pointer stored for out-of-line field `tag`, if present.
    #[must_use]
    pub fn pointer(&self, tag: OptionalFieldTag) -> Option<u64> {
        match self.get(tag) {
            Some(RuntimeValue::Pointer(pointer)) => Some(pointer),
            _ => None,
        }
    }

    /// Returns `true` if no field is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.iter().all(Option::is_none)
    }

    fn present(&self) -> impl Iterator<Item = (OptionalFieldTag, RuntimeValue)> + '_ {
        OptionalFieldTag::iter().filter_map(|tag| self.get(tag).map(|value| (tag, value)))
    }

    /// Number of bytes [`RuntimeFieldBuilder::encode`] writes.
    #[must_use]
    pub fn encoding_size(&self) -> usize {
        self.present()
            .map(|(_, value)| match value {
                RuntimeValue::Inline(raw) => field_size(raw),
                RuntimeValue::Pointer(_) => 1 + POINTER_SIZE,
            })
            .sum()
    }

    /// Appends the encoded stream to `destination` and returns the number of bytes written.
    ///
    /// Writes nothing when no field is present; such a descriptor has no field stream at all.
    pub fn encode(&self, destination: &mut Vec<u8>) -> usize {
        let count = self.present().count();
        let start = destination.len();

        for (position, (tag, value)) in self.present().enumerate() {
            let is_last = position + 1 == count;
            match value {
                RuntimeValue::Inline(raw) => {
                    encode_field(destination, tag, is_last, raw);
                }
                RuntimeValue::Pointer(pointer) => {
                    destination.push(tag.header(is_last));
                    destination.extend_from_slice(&pointer.to_le_bytes());
                }
            }
        }

        destination.len() - start
    }

    /// Encodes into a fresh buffer, `None` if no field is present.
    #[must_use]
    pub fn to_stream(&self) -> Option<Vec<u8>> {
        if self.is_empty() {
            return None;
        }

        let mut stream = Vec::with_capacity(self.encoding_size());
        self.encode(&mut stream);
        Some(stream)
    }

    /// Replaces the contents of this builder with the fields decoded from `source`.
    ///
    /// `None` clears every field.
    ///
    /// # Errors
    /// Returns an error if the stream is truncated or names an unknown tag. The builder is left
    /// empty in that case.
    pub fn decode(&mut self, source: Option<&[u8]>) -> Result<()> {
        *self = Self::new();
        let Some(source) = source else {
            return Ok(());
        };

        let mut fields = Self::new();
        let mut parser = Parser::new(source);
        loop {
            let (tag, is_last) = decode_tag(&mut parser)?;
            let value = if tag.is_inline() {
                RuntimeValue::Inline(decode_value(&mut parser)?)
            } else {
                RuntimeValue::Pointer(parser.read_le::<u64>()?)
            };
            fields.fields[tag.index()] = Some(value);

            if is_last {
                break;
            }
        }

        *self = fields;
        Ok(())
    }
}
