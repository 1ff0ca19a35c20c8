//! Compact optional fields for type descriptors.
//!
//! Most type descriptors carry a handful of rarely present attributes. Instead of reserving a
//! slot for each in every descriptor, the descriptor holds a single nullable reference to a *field
//! stream*: a short, variable-length sequence of `(tag, value)` pairs holding only the fields that
//! are actually present.
//!
//! Small integer attributes are stored *inline* in the stream. Larger data lives *out-of-line* in
//! a separate region; the stream only stores a compact delta from a shared *anchor*, an aligned
//! full-width address placed in front of a group of streams. Only anchors need relocations, and
//! a reader finds the anchor of any stream by masking the stream's address.
//!
//! # Architecture
//!
//! - [`tag`] - The closed tag set, field kinds and the generated typed accessors
//! - [`varint`] - Variable-length integer encoding used for every stored value
//! - [`codec`] - Field header encoding and the read-only [`OptionalFields`] view
//! - [`builder`] - [`FieldSetBuilder`] accumulating one descriptor's fields at build time
//! - [`planner`] - [`LayoutPlanner`] placing blobs, emitting anchors and encoding streams
//! - [`config`] - [`LayoutConfig`] tuning the anchor alignment and image base
//! - [`stats`] - [`LayoutStats`] collected while planning
//! - [`image`] - [`ImageBuilder`] and the placed [`Image`] the view reads from
//! - [`region`] - Named image regions and their extents
//! - [`runtime`] - [`RuntimeFieldBuilder`] for descriptors built at run time
//!
//! # Lifecycle
//!
//! 1. Create one [`FieldSetBuilder`] per descriptor and set its fields
//! 2. Hand each builder to [`LayoutPlanner::encode_fields`], keeping the returned handle
//! 3. Call [`LayoutPlanner::place`] once every descriptor is encoded
//! 4. Resolve handles with [`Image::resolve`] and read through [`Image::optional_fields`]
//!
//! Encoding is single-threaded. The placed image is immutable, so lookups may run on any number of
//! threads at once.
//!
//! # Examples
//!
//! ```rust
//! use optfields::prelude::*;
//!
//! let mut planner = LayoutPlanner::new(LayoutConfig::default())?;
//!
//! let mut plain = FieldSetBuilder::new();
//! plain.add_nullable_value_offset(8);
//!
//! let mut generic = FieldSetBuilder::new();
//! generic
//!     .add_rare_flags(RareFlags::IS_BYREF_LIKE)
//!     .add_generic_composition(OutlineBlob::new(vec![7; 16], 8));
//!
//! let plain = planner.encode_fields(plain)?;
//! let generic = planner.encode_fields(generic)?;
//! let none = planner.encode_fields(FieldSetBuilder::new())?;
//! assert!(none.is_none());
//!
//! let image = planner.place()?;
//!
//! let fields = image.optional_fields(image.resolve(plain));
//! assert_eq!(fields.nullable_value_offset(0)?, 8);
//!
//! let fields = image.optional_fields(image.resolve(generic));
//! assert!(fields.rare_flags(RareFlags::empty())?.contains(RareFlags::IS_BYREF_LIKE));
//! let composition = fields.generic_composition()?.unwrap();
//! assert_eq!(image.read(composition, 16)?, &[7; 16]);
//!
//! let fields = image.optional_fields(image.resolve(none));
//! assert_eq!(fields.dispatch_map(u32::MAX)?, u32::MAX);
//! # Ok::<(), optfields::Error>(())
//! ```

pub mod builder;
pub mod codec;
pub mod config;
pub mod image;
pub mod planner;
pub mod region;
pub mod runtime;
pub mod stats;
pub mod tag;
pub mod varint;

pub use builder::{FieldSetBuilder, FieldValue, OptionalField, OutlineBlob, OutlineBlobRc};
pub use codec::OptionalFields;
pub use config::{LayoutConfig, ANCHOR_SIZE};
pub use image::{Image, ImageBuilder};
pub use planner::{EncodingPlan, FieldsHandle, LayoutPlanner};
pub use region::{FileRegion, Region};
pub use runtime::{RuntimeFieldBuilder, RuntimeValue};
pub use stats::LayoutStats;
pub use tag::{
    FieldKind, InlineValue, OptionalFieldTag, RareFlags, LAST_FIELD_FLAG, MAX_OUTLINE_ALIGNMENT,
    MAX_STREAM_SIZE,
};
