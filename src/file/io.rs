//! Little-endian reading and writing of fixed-width integers.
//!
//! Field streams themselves are byte oriented, but anchors store a full-width address that has to
//! be written into the image at placement time and read back when an out-of-line field is
//! resolved. This module provides the bounds-checked primitives for both directions.
//!
//! # Key Components
//!
//! - [`crate::file::io::ByteIO`] - Trait for the primitive integer types that can be transferred
//! - [`crate::file::io::read_le`] / [`crate::file::io::read_le_at`] - Bounds-checked reads
//! - [`crate::file::io::write_le`] / [`crate::file::io::write_le_at`] - Bounds-checked writes
//!
//! # Usage Examples
//!
//! ```rust,ignore
//! use optfields::file::io::{read_le_at, write_le_at};
//!
//! let mut data = [0u8; 12];
//! let mut offset = 0;
//! write_le_at(&mut data, &mut offset, 0x1000_0000_u64)?;
//! write_le_at(&mut data, &mut offset, 7_u32)?;
//!
//! let mut offset = 0;
//! let anchor: u64 = read_le_at(&data, &mut offset)?;
//! assert_eq!(anchor, 0x1000_0000);
//! # Ok::<(), optfields::Error>(())
//! ```
//!
//! # Thread Safety
//!
//! All functions are pure over their arguments and can be called concurrently.

use crate::{Error::OutOfBounds, Result};

/// Trait for primitive integers with a fixed little-endian byte representation.
pub trait ByteIO: Sized {
    /// Byte array type of the encoded representation.
    type Bytes: AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Read `Self` from its little-endian representation
    fn from_le_bytes(bytes: Self::Bytes) -> Self;

    /// Produce the little-endian representation of `self`
    fn to_le_bytes(self) -> Self::Bytes;
}

macro_rules! impl_byte_io {
    ($($ty:ty => $len:expr),* $(,)?) => {
        $(
            impl ByteIO for $ty {
                type Bytes = [u8; $len];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }

                fn to_le_bytes(self) -> Self::Bytes {
                    <$ty>::to_le_bytes(self)
                }
            }
        )*
    };
}

impl_byte_io!(u8 => 1, u16 => 2, u32 => 4, u64 => 8);

/// Safely reads a value of type `T` in little-endian byte order from the start of `data`.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
pub fn read_le<T: ByteIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_le_at(data, &mut offset)
}

/// Safely reads a value of type `T` in little-endian byte order at `offset`, advancing it.
///
/// # Arguments
///
/// * `data` - The byte buffer to read from
/// * `offset` - Position to read at, advanced by the size of `T` on success
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
///
/// # Examples
///
/// ```rust,ignore
/// use optfields::file::io::read_le_at;
///
/// let data = [0x01, 0x00, 0x02, 0x00];
/// let mut offset = 0;
///
/// let first: u16 = read_le_at(&data, &mut offset)?;
/// assert_eq!(first, 1);
/// assert_eq!(offset, 2);
/// # Ok::<(), optfields::Error>(())
/// ```
pub fn read_le_at<T: ByteIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let end = offset.checked_add(type_len).ok_or(OutOfBounds)?;
    if end > data.len() {
        return Err(OutOfBounds);
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(OutOfBounds);
    };

    *offset = end;

    Ok(T::from_le_bytes(read))
}

/// Safely writes `value` in little-endian byte order to the start of `data`.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
pub fn write_le<T: ByteIO>(data: &mut [u8], value: T) -> Result<()> {
    let mut offset = 0_usize;
    write_le_at(data, &mut offset, value)
}

/// Safely writes `value` in little-endian byte order at `offset`, advancing it.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
pub fn write_le_at<T: ByteIO>(data: &mut [u8], offset: &mut usize, value: T) -> Result<()> {
    let type_len = std::mem::size_of::<T>();
    let end = offset.checked_add(type_len).ok_or(OutOfBounds)?;
    if end > data.len() {
        return Err(OutOfBounds);
    }

    data[*offset..end].copy_from_slice(value.to_le_bytes().as_ref());
    *offset = end;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_le_u8() {
        let result = read_le::<u8>(&[0xFE, 0xFF]).unwrap();
        assert_eq!(result, 0xFE);
    }

    #[test]
    fn read_le_u16() {
        let result = read_le::<u16>(&[0xFE, 0xFF]).unwrap();
        assert_eq!(result, 0xFFFE);
    }

    #[test]
    fn read_le_u32() {
        let result = read_le::<u32>(&[0x78, 0x56, 0x34, 0x12]).unwrap();
        assert_eq!(result, 0x1234_5678);
    }

    #[test]
    fn read_le_u64() {
        let data = [0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01];
        let result = read_le::<u64>(&data).unwrap();
        assert_eq!(result, 0x0102_0304_0506_0708);
    }

    #[test]
    fn read_le_at_advances() {
        let data = [0x01, 0x00, 0x02, 0x00, 0x00, 0x00];
        let mut offset = 0;

        assert_eq!(read_le_at::<u16>(&data, &mut offset).unwrap(), 1);
        assert_eq!(offset, 2);
        assert_eq!(read_le_at::<u32>(&data, &mut offset).unwrap(), 2);
        assert_eq!(offset, 6);
    }

    #[test]
    fn read_out_of_bounds() {
        let data = [0x01, 0x02, 0x03];
        let mut offset = 0;
        assert!(matches!(
            read_le_at::<u32>(&data, &mut offset),
            Err(OutOfBounds)
        ));
        assert_eq!(offset, 0);

        let mut offset = usize::MAX;
        assert!(matches!(read_le_at::<u8>(&data, &mut offset), Err(OutOfBounds)));
    }

    #[test]
    fn write_le_at_advances() {
        let mut data = [0u8; 12];
        let mut offset = 0;

        write_le_at(&mut data, &mut offset, 0x1122_3344_5566_7788_u64).unwrap();
        write_le_at(&mut data, &mut offset, 0xAABB_CCDD_u32).unwrap();

        assert_eq!(offset, 12);
        assert_eq!(
            data,
            [0x88, 0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11, 0xDD, 0xCC, 0xBB, 0xAA]
        );
    }

    #[test]
    fn write_out_of_bounds() {
        let mut data = [0u8; 7];
        assert!(matches!(write_le(&mut data, 1_u64), Err(OutOfBounds)));
        assert_eq!(data, [0u8; 7]);
    }
}
