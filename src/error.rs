use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! out_of_bounds_error {
    () => {
        crate::Error::OutOfBounds
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Only conditions that can be caused by *data* are part of this enum: truncated or foreign
/// field streams, addresses outside of a placed image and invalid layout configurations.
/// Misuse of the build-time protocol (placing a blob twice, encoding without a matching plan,
/// mutating a builder after it was handed to the planner) is a programming error and is caught
/// by debug assertions instead.
///
/// # Error Categories
///
/// ## Decoding Errors
/// - [`Error::Malformed`] - A field stream or variable-length integer is corrupted
/// - [`Error::OutOfBounds`] - A read would run past the end of the available data
/// - [`Error::UnknownTag`] - A field header carries a tag outside the known tag set
/// - [`Error::InvalidAddress`] - An address does not fall into the placed image
///
/// ## Layout Errors
/// - [`Error::Configuration`] - The [`crate::LayoutConfig`] violates a layout constraint
/// - [`Error::LayoutOverflow`] - More out-of-line data than 32-bit region offsets can address
///
/// # Examples
///
/// ```rust
/// use optfields::{Error, metadata::optionalfields::varint};
///
/// match varint::decode(&[]) {
///     Ok((value, _)) => println!("Decoded {}", value),
///     Err(Error::OutOfBounds) => println!("Stream was truncated"),
///     Err(e) => println!("Other error: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The data is damaged and could not be decoded.
    ///
    /// The error includes the source location where the malformation was detected for
    /// debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while decoding.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// A field header carried a tag value that is not part of the tag set.
    #[error("Unknown optional field tag - {0}")]
    UnknownTag(u8),

    /// The address does not resolve to a location inside the image.
    #[error("Address {0:#x} is outside of the image")]
    InvalidAddress(u64),

    /// The layout configuration violates one of its constraints.
    #[error("Invalid layout configuration - {0}")]
    Configuration(String),

    /// The out-of-line region grew past the range a field stream can reference.
    #[error("Out-of-line region exceeds {0:#x} bytes")]
    LayoutOverflow(u64),
}
