//! Low-level byte stream parser for field stream decoding.
//!
//! This module provides the [`crate::file::parser::Parser`] type, a cursor-based binary data
//! parser used to walk encoded field streams. All reads are bounds-checked, so a truncated or
//! foreign stream surfaces as an error instead of reading past the data.
//!
//! # Key Components
//!
//! - [`crate::file::parser::Parser::read_le`] - Read primitive types (little-endian)
//! - [`crate::file::parser::Parser::read_varint`] - Read a variable-length encoded `u32`
//! - [`crate::file::parser::Parser::pos`] - Get current position
//!
//! # Usage Examples
//!
//! ```rust
//! use optfields::Parser;
//!
//! // A one byte varint (value 5) followed by a little-endian u16
//! let data = [0x28, 0x34, 0x12];
//! let mut parser = Parser::new(&data);
//!
//! assert_eq!(parser.read_varint()?, 5);
//! assert_eq!(parser.read_le::<u16>()?, 0x1234);
//! assert!(!parser.has_more_data());
//! # Ok::<(), optfields::Error>(())
//! ```

use crate::{
    file::io::{read_le_at, ByteIO},
    metadata::optionalfields::varint,
    Result,
};

/// A cursor over a byte slice.
///
/// `Parser` maintains an internal position and provides bounds checking to prevent buffer
/// overruns when reading malformed or truncated data.
pub struct Parser<'a> {
    /// The binary data being parsed
    data: &'a [u8],
    /// Current position within the data buffer
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new [`crate::file::parser::Parser`] from a byte slice.
    ///
    /// # Arguments
    /// * `data` - The byte slice to read from
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Returns `true` if there is more data available to parse.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Get the current position of the parser within the data buffer.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Read a type `T` from the current position in little-endian format and advance the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data length.
    pub fn read_le<T: ByteIO>(&mut self) -> Result<T> {
        read_le_at::<T>(self.data, &mut self.position)
    }

    /// Read a variable-length encoded unsigned 32-bit integer.
    ///
    /// See [`crate::metadata::optionalfields::varint`] for the size classes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the encoding is truncated or
    /// [`crate::Error::Malformed`] if the length prefix or value is invalid.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use optfields::Parser;
    ///
    /// let data = [0x41, 0x1F];
    /// let mut parser = Parser::new(&data);
    /// assert_eq!(parser.read_varint()?, 1000);
    /// assert_eq!(parser.pos(), 2);
    /// # Ok::<(), optfields::Error>(())
    /// ```
    pub fn read_varint(&mut self) -> Result<u32> {
        let (value, consumed) = varint::decode(&self.data[self.position..])?;
        self.position += consumed;
        Ok(value)
    }
}
