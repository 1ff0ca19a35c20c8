//! Low-level byte access shared by the encoders and decoders.
//!
//! - [`io`] - Bounds-checked little-endian reads and writes of primitive integers
//! - [`parser`] - Sequential cursor over a byte slice

pub mod io;
pub mod parser;
