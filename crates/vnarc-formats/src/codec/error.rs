//! Error types for decompressors

use thiserror::Error;

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;

/// Failures while expanding a compressed block
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Packed input ended before the declared output size was reached
    #[error("Stream truncated: produced {produced} of {expected} bytes")]
    Truncated {
        /// Declared unpacked size
        expected: usize,
        /// Bytes produced before input ran out
        produced: usize,
    },

    /// Back-reference points before the start of the output
    #[error("Invalid back-reference: distance {distance} at output position {position}")]
    InvalidBackReference {
        /// Output position of the copy
        position: usize,
        /// Requested distance or source offset
        distance: usize,
    },

    /// Declared size exceeds the decoder limit
    #[error("Unpacked size {size} exceeds limit {limit}")]
    TooLarge {
        /// Declared size
        size: usize,
        /// Largest accepted size
        limit: usize,
    },

    /// zlib stream failure
    #[error("Inflate failed: {0}")]
    Inflate(String),
}
