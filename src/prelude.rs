//! # optfields Prelude
//!
//! The most commonly used types for building, placing and reading optional field streams.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all optfields operations
pub use crate::Error;

/// The result type used throughout optfields
pub use crate::Result;

/// Low-level stream decoding cursor
pub use crate::Parser;

// ================================================================================================
// Build Side
// ================================================================================================

/// Layout planning, configuration and statistics
pub use crate::metadata::optionalfields::{FieldsHandle, LayoutConfig, LayoutPlanner, LayoutStats};

/// Per-descriptor field accumulation and out-of-line blobs
pub use crate::metadata::optionalfields::{
    FieldSetBuilder, FieldValue, OptionalField, OutlineBlob, OutlineBlobRc,
};

// ================================================================================================
// Tag Set
// ================================================================================================

/// Tags, kinds and typed inline values
pub use crate::metadata::optionalfields::{FieldKind, InlineValue, OptionalFieldTag, RareFlags};

// ================================================================================================
// Read Side
// ================================================================================================

/// Placed image and the descriptor view over it
pub use crate::metadata::optionalfields::{FileRegion, Image, ImageBuilder, OptionalFields, Region};

/// Self-contained streams for run-time built descriptors
pub use crate::metadata::optionalfields::{RuntimeFieldBuilder, RuntimeValue};
