//! Variable-length encoding of unsigned 32-bit integers.
//!
//! Every value in a field stream (inline values and out-of-line deltas alike) is stored with this
//! encoding. The number of bytes used is a step function of the number of significant bits:
//!
//! | significant bits | bytes |
//! |------------------|-------|
//! | 0 - 3            | 1     |
//! | 4 - 10           | 2     |
//! | 11 - 17          | 3     |
//! | 18 - 24          | 4     |
//! | 25 - 32          | 5     |
//!
//! The layout planner relies on [`encoding_size`] matching what [`encode`] emits byte for byte,
//! so both are driven by the same table.
//!
//! # Bit Layout
//!
//! The low three bits of the first byte hold `length - 1`, the upper five bits hold the low five
//! bits of the value. The remaining `length - 1` bytes carry the value shifted right by five, in
//! little-endian order. Knowing the length from the first byte lets the decoder skip a value
//! without looking at its payload.
//!
//! # Examples
//!
//! ```rust
//! use optfields::metadata::optionalfields::varint;
//!
//! let mut buffer = Vec::new();
//! let written = varint::encode(1023, &mut buffer);
//! assert_eq!(written, 2);
//! assert_eq!(varint::encoding_size(1023), 2);
//!
//! let (value, consumed) = varint::decode(&buffer)?;
//! assert_eq!((value, consumed), (1023, 2));
//! # Ok::<(), optfields::Error>(())
//! ```

use crate::Result;

/// Largest number of bytes a single value can occupy.
pub const MAX_ENCODING_SIZE: usize = 5;

const LENGTH_MASK: u8 = 0x07;
const FIRST_BYTE_SHIFT: u32 = 3;
const FIRST_BYTE_BITS: u32 = 5;
const FIRST_BYTE_MASK: u32 = (1 << FIRST_BYTE_BITS) - 1;

/// Returns the number of significant (non leading-zero) bits of `value`.
#[must_use]
pub fn significant_bits(value: u32) -> u32 {
    u32::BITS - value.leading_zeros()
}

/// Returns the number of bytes [`encode`] uses for `value`.
#[must_use]
pub fn encoding_size(value: u32) -> usize {
    match significant_bits(value) {
        0..=3 => 1,
        4..=10 => 2,
        11..=17 => 3,
        18..=24 => 4,
        _ => 5,
    }
}

/// Appends the encoding of `value` to `buffer` and returns the number of bytes written.
pub fn encode(value: u32, buffer: &mut Vec<u8>) -> usize {
    let size = encoding_size(value);

    // size <= 5, the prefix always fits the three length bits
    #[allow(clippy::cast_possible_truncation)]
    let first = (((value & FIRST_BYTE_MASK) << FIRST_BYTE_SHIFT) as u8) | (size as u8 - 1);
    buffer.push(first);

    let rest = u64::from(value >> FIRST_BYTE_BITS).to_le_bytes();
    buffer.extend_from_slice(&rest[..size - 1]);

    size
}

/// Decodes a value from the start of `data`.
///
/// Returns the value together with the number of bytes consumed.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if `data` ends before the encoding does, or
/// [`crate::Error::Malformed`] if the length prefix exceeds five bytes or the payload does not
/// fit into 32 bits.
pub fn decode(data: &[u8]) -> Result<(u32, usize)> {
    let Some(&first) = data.first() else {
        return Err(out_of_bounds_error!());
    };

    let size = usize::from(first & LENGTH_MASK) + 1;
    if size > MAX_ENCODING_SIZE {
        return Err(malformed_error!(
            "Invalid varint length prefix - {}",
            first & LENGTH_MASK
        ));
    }

    if data.len() < size {
        return Err(out_of_bounds_error!());
    }

    let mut rest = [0u8; 8];
    rest[..size - 1].copy_from_slice(&data[1..size]);
    let value =
        (u64::from_le_bytes(rest) << FIRST_BYTE_BITS) | u64::from(first >> FIRST_BYTE_SHIFT);

    let value = u32::try_from(value)
        .map_err(|_| malformed_error!("Varint value {:#x} exceeds 32 bits", value))?;

    Ok((value, size))
}
