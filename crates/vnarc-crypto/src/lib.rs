//! Cryptographic primitives for visual-novel engine archives
//!
//! This crate collects the ciphers, checksums and pseudo-random generators
//! that game engines use to obfuscate their resource archives. None of them
//! is meant to be secure; they only need to be bit-exact.
//!
//! # Components
//!
//! - **Checksums**: CRC-32, Adler-32 and the CatSystem2 passphrase hash
//! - **Stream ciphers**: AZ System XOR-rotate and the ISAAC-64 keystream
//! - **Block ciphers**: Studio Jikkenshitsu Feistel, CatSystem2 Blowfish
//! - **Generators**: SFMT-19937 and MT19937 used for key derivation
//! - **Name ciphers**: per-character substitution and base-40 digits
//!
//! # Examples
//!
//! ```
//! use vnarc_crypto::{xor_rotate, SjTransform};
//!
//! let mut index = vec![0u8; 16];
//! xor_rotate::decrypt(&mut index, 0x30, 0x1234_5678);
//!
//! let cipher = SjTransform::new(b"secret").expect("valid key");
//! let mut block = *b"8 bytes!";
//! cipher.encrypt(&mut block);
//! cipher.decrypt(&mut block);
//! assert_eq!(&block, b"8 bytes!");
//! ```

#![warn(missing_docs)]

pub mod checksum;
pub mod error;
pub mod int_cipher;
pub mod isaac64;
pub mod mt19937;
pub mod sfmt;
pub mod sj_transform;
pub mod substitution;
pub mod xor_rotate;

pub use error::CryptoError;

// Re-export commonly used types
pub use checksum::{Adler32, adler32, crc32, crc32_normal_key};
pub use int_cipher::IntCipher;
pub use isaac64::{AzIsaacKeystream, Isaac64};
pub use mt19937::Mt19937;
pub use sfmt::Sfmt19937;
pub use sj_transform::SjTransform;
