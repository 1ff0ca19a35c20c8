//! Descriptor metadata emitted alongside compiled types.
//!
//! # Key Components
//!
//! - [`optionalfields`] - Compact, tagged storage for rarely present descriptor attributes,
//!   with the layout planner that places them and the read-side accessors
pub mod optionalfields;
