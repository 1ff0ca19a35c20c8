// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # optfields
//!
//! Compact storage of optional, rarely present attributes of type descriptors.
//!
//! Each descriptor references at most one *field stream*: a tagged, variable-length encoding of
//! just the attributes it actually carries. Small values are stored inline; larger data is placed
//! out-of-line and referenced through a short delta from a shared, aligned *anchor*, so that a
//! whole group of streams needs only one full-width address.
//!
//! ## Features
//!
//! - **Compact encoding** - Absent fields cost nothing, small values take a single byte
//! - **Anchor-relative references** - Out-of-line data is addressed with small deltas, one
//!   relocatable address per anchor group
//! - **Typed accessors** - One getter and one setter per tag, generated from a single table
//! - **Run-time flavour** - Self-contained streams with raw pointers for dynamically built types
//! - **Layout statistics** - Per-tag counts, size distribution, anchor and padding overhead
//!
//! ## Quick Start
//!
//! ```rust
//! use optfields::prelude::*;
//!
//! let mut planner = LayoutPlanner::new(LayoutConfig::default())?;
//!
//! let mut builder = FieldSetBuilder::new();
//! builder
//!     .add_dispatch_map(3)
//!     .add_sealed_virtual_slots(OutlineBlob::new(vec![0u8; 12], 4));
//! let handle = planner.encode_fields(builder)?;
//!
//! let image = planner.place()?;
//! let fields = image.optional_fields(image.resolve(handle));
//! assert_eq!(fields.dispatch_map(0)?, 3);
//! assert!(fields.sealed_virtual_slots()?.is_some());
//! # Ok::<(), optfields::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`prelude`] - Convenient re-exports of commonly used types and traits
//! - [`metadata::optionalfields`] - Tag set, codec, builder, layout planner and placed image
//! - [`Error`] and [`Result`] - Error handling for decoding and configuration
//!
//! ## Logging
//!
//! The layout planner reports anchors, placement and summary statistics through the [`log`]
//! facade at `debug` and `trace` level. Install any logger to see them.
//!
//! ### Testing
//!
//! ```bash
//! cargo test
//! cargo bench
//! ```
#[macro_use]
pub(crate) mod error;
pub(crate) mod file;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use optfields::prelude::*;
///
/// let mut builder = RuntimeFieldBuilder::new();
/// builder.set(OptionalFieldTag::DispatchMap, RuntimeValue::Inline(1));
/// assert!(builder.to_stream().is_some());
/// ```
pub mod prelude;

/// Descriptor metadata and its optional field storage.
pub mod metadata;

/// `optfields` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `optfields` Error type
///
/// # Examples
///
/// ```rust
/// use optfields::{Error, LayoutConfig};
///
/// match LayoutConfig::default().with_header_alignment_shift(2).validate() {
///     Ok(()) => println!("Valid"),
///     Err(Error::Configuration(reason)) => println!("Rejected: {}", reason),
///     Err(e) => println!("Error: {}", e),
/// }
/// ```
pub use error::Error;

/// Layout tuning parameters, see [`metadata::optionalfields::config`].
pub use metadata::optionalfields::config::LayoutConfig;

/// Sequential byte cursor used by the field stream decoders.
///
/// # Example
///
/// ```rust
/// use optfields::Parser;
///
/// let data = [0x41, 0x1F];
/// let mut parser = Parser::new(&data);
/// assert_eq!(parser.read_varint()?, 1000);
/// # Ok::<(), optfields::Error>(())
/// ```
pub use file::parser::Parser;
