//! The closed set of optional field tags.
//!
//! Every optional field is identified by a tag and statically classified as either *inline*
//! (a small integer stored directly in the field stream) or *out-of-line* (a reference to an
//! opaque, aligned blob stored in a separate region). The whole set is declared once through the
//! `optional_fields!` macro, which also generates the typed accessors on
//! [`crate::metadata::optionalfields::OptionalFields`] and the typed setters on
//! [`crate::metadata::optionalfields::FieldSetBuilder`].
//!
//! # Field Set
//!
//! | Tag | Kind | Value |
//! |-----|------|-------|
//! | `RareFlags` | inline | [`RareFlags`] |
//! | `DispatchMap` | inline | `u32` |
//! | `ValueTypeFieldPadding` | inline | `u32` |
//! | `NullableValueOffset` | inline | `u8` |
//! | `ICastableIsInstSlot` | inline | `u16` |
//! | `ICastableGetImplTypeSlot` | inline | `u16` |
//! | `SealedVirtualSlots` | out-of-line | 4-byte aligned blob |
//! | `GenericComposition` | out-of-line | 8-byte aligned blob |
//! | `ThreadStaticInfo` | out-of-line | 16-byte aligned blob |

use bitflags::bitflags;
use strum::{AsRefStr, EnumCount, EnumIter, FromRepr};

use crate::metadata::optionalfields::{
    builder::{FieldSetBuilder, OutlineBlobRc},
    codec::OptionalFields,
    varint::MAX_ENCODING_SIZE,
};
use crate::Result;

/// Bit of the field header that marks the last field of a stream.
pub const LAST_FIELD_FLAG: u8 = 0x80;

/// Bits of the field header that hold the tag.
pub const TAG_MASK: u8 = 0x7F;

/// Whether a tag stores its value inline or out-of-line.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum FieldKind {
    /// The field value is a small integer encoded directly in the stream.
    Inline,
    /// The field value references a blob in the out-of-line region.
    OutOfLine {
        /// Alignment of the referenced blob; deltas are scaled by this value.
        alignment: u32,
    },
}

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    /// Rarely set type descriptor flags, stored in the `RareFlags` optional field
    pub struct RareFlags: u32 {
        /// Instances require 8-byte alignment on platforms that do not provide it by default
        const REQUIRES_ALIGN8 = 0x0001;
        /// The descriptor was constructed at run time
        const IS_DYNAMIC_TYPE = 0x0002;
        /// The type has a class constructor that has to run before first access
        const HAS_CCTOR = 0x0004;
        /// The type carries sealed virtual slots out-of-line
        const HAS_SEALED_VTABLE_ENTRIES = 0x0008;
        /// The type is an abstract class
        const IS_ABSTRACT_CLASS = 0x0010;
        /// GC statics are allocated dynamically
        const HAS_DYNAMIC_GC_STATICS = 0x0020;
        /// Thread statics are allocated dynamically
        const HAS_DYNAMIC_THREAD_STATICS = 0x0040;
        /// The type is a byref-like value type
        const IS_BYREF_LIKE = 0x0080;
    }
}

/// Conversion between a typed inline value and the raw 32-bit field value.
///
/// Narrow types truncate on the way back, mirroring how their setters widen.
pub trait InlineValue: Copy {
    /// Widen the value to the raw field representation
    fn to_raw(self) -> u32;
    /// Narrow a raw field value back to the typed value
    fn from_raw(raw: u32) -> Self;
}

impl InlineValue for u32 {
    fn to_raw(self) -> u32 {
        self
    }

    fn from_raw(raw: u32) -> Self {
        raw
    }
}

impl InlineValue for u16 {
    fn to_raw(self) -> u32 {
        u32::from(self)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn from_raw(raw: u32) -> Self {
        raw as u16
    }
}

impl InlineValue for u8 {
    fn to_raw(self) -> u32 {
        u32::from(self)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn from_raw(raw: u32) -> Self {
        raw as u8
    }
}

impl InlineValue for RareFlags {
    fn to_raw(self) -> u32 {
        self.bits()
    }

    fn from_raw(raw: u32) -> Self {
        RareFlags::from_bits_retain(raw)
    }
}

const fn max_of(values: &[u32]) -> u32 {
    let mut max = 1;
    let mut index = 0;
    while index < values.len() {
        if values[index] > max {
            max = values[index];
        }
        index += 1;
    }
    max
}

macro_rules! optional_fields {
    (
        inline {
            $( $(#[$imeta:meta])* $iname:ident : $ity:ty => $iget:ident, $iadd:ident; )*
        }
        outline {
            $( $(#[$ometa:meta])* $oname:ident : align $oalign:literal => $oget:ident, $oadd:ident; )*
        }
    ) => {
        /// Identifiers of all optional fields.
        ///
        /// The discriminant is the 7-bit tag written into each field header.
        #[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, EnumIter, EnumCount, FromRepr, AsRefStr)]
        #[repr(u8)]
        pub enum OptionalFieldTag {
            $( $(#[$imeta])* $iname, )*
            $( $(#[$ometa])* $oname, )*
        }

        impl OptionalFieldTag {
            /// Returns whether this tag is stored inline or out-of-line.
            #[must_use]
            pub const fn kind(self) -> FieldKind {
                match self {
                    $( OptionalFieldTag::$iname => FieldKind::Inline, )*
                    $( OptionalFieldTag::$oname => FieldKind::OutOfLine { alignment: $oalign }, )*
                }
            }
        }

        /// Largest alignment of any out-of-line tag.
        pub const MAX_OUTLINE_ALIGNMENT: u32 = max_of(&[$( $oalign ),*]);

        impl OptionalFields<'_> {
            $(
                #[doc = concat!("Returns the `", stringify!($iname), "` field, or `default` if it is not present.")]
                ///
                /// # Errors
                ///
                /// Returns an error if the field stream is malformed.
                pub fn $iget(&self, default: $ity) -> Result<$ity> {
                    let raw = self.get_inline_field(OptionalFieldTag::$iname, default.to_raw())?;
                    Ok(<$ity as InlineValue>::from_raw(raw))
                }
            )*

            $(
                #[doc = concat!("Returns the address of the `", stringify!($oname), "` blob, or `None` if it is not present.")]
                ///
                /// # Errors
                ///
                /// Returns an error if the field stream or its anchor is malformed.
                pub fn $oget(&self) -> Result<Option<u64>> {
                    self.get_outline_field(OptionalFieldTag::$oname, $oalign)
                }
            )*
        }

        impl FieldSetBuilder {
            $(
                #[doc = concat!("Sets the `", stringify!($iname), "` field.")]
                pub fn $iadd(&mut self, value: $ity) -> &mut Self {
                    self.add_inline_field(OptionalFieldTag::$iname, value.to_raw())
                }
            )*

            $(
                #[doc = concat!("Sets the `", stringify!($oname), "` field to an unplaced blob.")]
                ///
                /// The blob must not have been placed yet; the layout planner copies it into the
                /// out-of-line region when this builder is encoded.
                pub fn $oadd(&mut self, blob: OutlineBlobRc) -> &mut Self {
                    self.add_outline_field(OptionalFieldTag::$oname, blob)
                }
            )*
        }
    };
}

optional_fields! {
    inline {
        /// Rarely used descriptor flags
        RareFlags: RareFlags => rare_flags, add_rare_flags;
        /// Index of the interface dispatch map
        DispatchMap: u32 => dispatch_map, add_dispatch_map;
        /// Padding added to value types when boxed
        ValueTypeFieldPadding: u32 => value_type_field_padding, add_value_type_field_padding;
        /// Offset of the value within a `Nullable<T>` instance
        NullableValueOffset: u8 => nullable_value_offset, add_nullable_value_offset;
        /// Vtable slot of the `IsInstanceOfInterface` implementation
        ICastableIsInstSlot: u16 => icastable_is_inst_slot, add_icastable_is_inst_slot;
        /// Vtable slot of the `GetImplType` implementation
        ICastableGetImplTypeSlot: u16 => icastable_get_impl_type_slot, add_icastable_get_impl_type_slot;
    }
    outline {
        /// Table of sealed virtual method slots
        SealedVirtualSlots: align 4 => sealed_virtual_slots, add_sealed_virtual_slots;
        /// Generic composition (instantiation arguments and variance)
        GenericComposition: align 8 => generic_composition, add_generic_composition;
        /// Thread static layout descriptor
        ThreadStaticInfo: align 16 => thread_static_info, add_thread_static_info;
    }
}

const _: () = assert!(OptionalFieldTag::COUNT <= (TAG_MASK as usize) + 1);

/// Upper bound on the encoded size of a single field stream (every tag present, widest values).
pub const MAX_STREAM_SIZE: usize = OptionalFieldTag::COUNT * (1 + MAX_ENCODING_SIZE);

impl OptionalFieldTag {
    /// Slot index of this tag in per-tag arrays.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Returns `true` if the tag carries an inline value.
    #[must_use]
    pub const fn is_inline(self) -> bool {
        matches!(self.kind(), FieldKind::Inline)
    }

    /// Alignment of the blob referenced by an out-of-line tag, `None` for inline tags.
    #[must_use]
    pub const fn outline_alignment(self) -> Option<u32> {
        match self.kind() {
            FieldKind::Inline => None,
            FieldKind::OutOfLine { alignment } => Some(alignment),
        }
    }

    /// Builds the header byte for this tag.
    #[must_use]
    pub const fn header(self, is_last: bool) -> u8 {
        let tag = self as u8;
        if is_last {
            tag | LAST_FIELD_FLAG
        } else {
            tag
        }
    }
}
