//! Error types for the mmdb-reader library

use thiserror::Error;

/// Result type alias for reader operations
pub type Result<T> = std::result::Result<T, MmdbError>;

/// Malformed encoding found while decoding the data section
///
/// Every variant carries the offset it was detected at so a caller can
/// report the offending record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Type number with no decoder (including the reserved container and end marker types)
    #[error("Unknown type {type_num} at offset {offset}")]
    UnknownType {
        /// Computed type number
        type_num: u16,
        /// Offset of the control byte
        offset: usize,
    },

    /// Extended type byte that does not name an extended type
    #[error("Invalid Extended Type at offset {offset} val {value}")]
    InvalidExtendedType {
        /// Offset of the extended type byte
        offset: usize,
        /// Computed type number (7 + extended byte)
        value: u16,
    },

    /// A read would run past the end of the buffer
    #[error("Unexpected end of data: need {needed} bytes at offset {offset}, buffer is {len} bytes")]
    OutOfBounds {
        /// Offset the read starts at
        offset: usize,
        /// Number of bytes the read needs
        needed: usize,
        /// Total buffer length
        len: usize,
    },

    /// Size field not valid for the type
    #[error("Invalid size {size} for {type_name} at offset {offset}")]
    InvalidSize {
        /// Name of the type being decoded
        type_name: &'static str,
        /// Declared size
        size: usize,
        /// Offset of the control byte
        offset: usize,
    },

    /// String payload is not valid UTF-8
    #[error("Invalid UTF-8 in string at offset {offset}")]
    InvalidUtf8 {
        /// Offset of the string payload
        offset: usize,
    },

    /// Map key decoded to something other than a string
    #[error("Map key at offset {offset} is not a string")]
    NonStringKey {
        /// Offset of the key
        offset: usize,
    },

    /// Nesting or pointer chain deeper than the configured limit
    #[error("Recursion too deep at offset {offset}: exceeded limit of {limit}")]
    DepthLimitExceeded {
        /// Offset being decoded when the limit was hit
        offset: usize,
        /// Configured limit
        limit: usize,
    },
}

/// Reader-level error type
#[derive(Debug, Error)]
pub enum MmdbError {
    /// Record size other than 24, 28 or 32 bits
    #[error("Unsupported record size: {0} bits")]
    UnsupportedRecordSize(u16),

    /// Metadata marker not found
    #[error("MMDB metadata marker not found")]
    MetadataNotFound,

    /// Invalid metadata structure
    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    /// Inconsistent file layout or search tree
    #[error("Invalid MMDB format: {0}")]
    InvalidFormat(String),

    /// Data decoding error
    #[error("Data decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Invalid or unsupported IP address
    #[error("Invalid IP address: {0}")]
    InvalidIpAddress(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
