//! Crate-level error taxonomy
//!
//! Errors split into three groups that callers treat differently:
//!
//! - [`Error::FormatMismatch`]: the opener declined; try the next format
//! - entry-local errors ([`Error::is_entry_local`]): skip this entry only
//! - everything else: the archive itself is unusable

use thiserror::Error;
use vnarc_crypto::CryptoError;

use crate::codec::CodecError;
use crate::rugp::RioError;

/// Result type for archive and image operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while opening archives and decoding entries
#[derive(Debug, Error)]
pub enum Error {
    /// Signature or structural check failed; not this format
    #[error("Format mismatch: {0}")]
    FormatMismatch(String),

    /// Signature matched but the directory is inconsistent
    #[error("Corrupt index: {0}")]
    CorruptIndex(String),

    /// Read outside the byte source
    #[error("Read out of bounds: {len} bytes at offset {offset:#x} (source length {source_len:#x})")]
    OutOfBounds {
        /// Requested offset
        offset: u64,
        /// Requested length
        len: u64,
        /// Total length of the source
        source_len: u64,
    },

    /// Integrity check failed inside a single entry
    #[error("Corrupt entry data: {0}")]
    CorruptData(String),

    /// Required key material was not supplied
    #[error("Missing key: {0}")]
    MissingKey(String),

    /// No known scheme decrypts this archive
    #[error("Unknown encryption scheme: {0}")]
    UnknownEncryptionScheme(String),

    /// Recognized format with an unimplemented field combination
    #[error("Unsupported {what}: {value:#x}")]
    UnsupportedVariant {
        /// Name of the offending field
        what: &'static str,
        /// Offending value
        value: u64,
    },

    /// Decompression failure
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// rUGP object stream failure
    #[error(transparent)]
    Rio(#[from] RioError),

    /// Cipher setup failure
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// I/O failure from a memory-mapped source or zlib stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary header parsing failure
    #[error("Binary parse error: {0}")]
    BinRw(#[from] binrw::Error),
}

impl Error {
    /// Build a [`Error::FormatMismatch`]
    pub fn mismatch(reason: impl Into<String>) -> Self {
        Self::FormatMismatch(reason.into())
    }

    /// Build a [`Error::CorruptIndex`]
    pub fn corrupt_index(reason: impl Into<String>) -> Self {
        Self::CorruptIndex(reason.into())
    }

    /// Build a [`Error::UnsupportedVariant`]
    pub fn unsupported(what: &'static str, value: impl Into<u64>) -> Self {
        Self::UnsupportedVariant {
            what,
            value: value.into(),
        }
    }

    /// The opener declined; probing should continue with the next format
    pub fn is_mismatch(&self) -> bool {
        matches!(self, Self::FormatMismatch(_))
    }

    /// Only the entry being read is affected
    pub fn is_entry_local(&self) -> bool {
        matches!(
            self,
            Self::Codec(_)
                | Self::CorruptData(_)
                | Self::OutOfBounds { .. }
                | Self::UnsupportedVariant { .. }
                | Self::MissingKey(_)
        )
    }

    /// The caller may retry after supplying key material
    pub fn needs_key(&self) -> bool {
        matches!(self, Self::MissingKey(_) | Self::UnknownEncryptionScheme(_))
    }

    /// A codec ran out of input
    pub fn is_truncated(&self) -> bool {
        matches!(self, Self::Codec(CodecError::Truncated { .. }))
    }
}

/// Convert a header parse failure into a decline
///
/// Short input, bad magic and failed assertions all mean the bytes are not
/// this format.
pub(crate) fn header_mismatch(err: binrw::Error) -> Error {
    let reason = match err.root_cause() {
        binrw::Error::BadMagic { .. } => Some("bad magic".to_string()),
        binrw::Error::AssertFail { message, .. } => Some(message.clone()),
        cause if cause.is_eof() => Some("header truncated".to_string()),
        _ => None,
    };
    match reason {
        Some(reason) => Error::FormatMismatch(reason),
        None => Error::BinRw(err),
    }
}
