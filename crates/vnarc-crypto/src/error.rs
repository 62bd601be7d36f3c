//! Error types for cryptographic operations

use thiserror::Error;

/// Errors that can occur during cryptographic operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Invalid key size
    #[error("Invalid key size: expected at most {max}, got {actual}")]
    InvalidKeySize {
        /// Largest accepted key size in bytes
        max: usize,
        /// Actual key size in bytes
        actual: usize,
    },

    /// Empty key material
    #[error("Key material is empty")]
    EmptyKey,

    /// Invalid key format
    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),
}

impl From<hex::FromHexError> for CryptoError {
    fn from(err: hex::FromHexError) -> Self {
        Self::InvalidKeyFormat(err.to_string())
    }
}
