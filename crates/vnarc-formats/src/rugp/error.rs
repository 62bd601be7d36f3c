//! Errors of the rUGP object deserializer

use thiserror::Error;

/// Failures while reading a rUGP object stream
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RioError {
    /// Stream does not start with `RIO\0`
    #[error("Missing RIO signature")]
    BadSignature,

    /// Stream ended inside a field
    #[error("Object stream truncated at offset {offset:#x}")]
    Truncated {
        /// Position of the failed read
        offset: usize,
    },

    /// Class name outside the closed registry
    #[error("Unknown class {0:?}")]
    UnknownClass(String),

    /// Tag refers to a load slot that is missing or of the wrong kind
    #[error("Bad class reference to load slot {0}")]
    BadClass(u32),

    /// Object nesting exceeded the depth guard
    #[error("Object nesting deeper than {0}")]
    RecursionLimit(usize),

    /// Schema version outside the supported range
    #[error("Unsupported {class} version {version:#x}")]
    UnsupportedVersion {
        /// Class whose version field was rejected
        class: &'static str,
        /// Stored version
        version: u32,
    },

    /// Scrambled class name used the reserved selector
    #[error("Invalid scrambled class name")]
    InvalidClassName,
}
