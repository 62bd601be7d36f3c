//! Blowfish layer of CatSystem2 INT archives
//!
//! INT archives use little-endian Blowfish. The 4-byte key is the first
//! output of [`Mt19937`] seeded from a value stored in the archive.

use blowfish::BlowfishLE;
use cipher::generic_array::GenericArray;
use cipher::{BlockDecrypt, BlockEncrypt, KeyInit};

use crate::error::CryptoError;
use crate::mt19937::Mt19937;

/// Blowfish block size
pub const BLOCK_SIZE: usize = 8;

/// Blowfish cipher keyed for one INT archive
#[derive(Clone)]
pub struct IntCipher {
    inner: BlowfishLE,
}

impl std::fmt::Debug for IntCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntCipher").finish_non_exhaustive()
    }
}

impl IntCipher {
    /// Create a cipher from raw Blowfish key bytes (4 to 56 bytes)
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        let inner = BlowfishLE::new_from_slice(key).map_err(|_| CryptoError::InvalidKeySize {
            max: 56,
            actual: key.len(),
        })?;
        Ok(Self { inner })
    }

    /// Derive the archive cipher from the seed stored in the key record
    pub fn from_seed(seed: u32) -> Result<Self, CryptoError> {
        let key = Mt19937::new(seed).next_u32().to_le_bytes();
        Self::new(&key)
    }

    /// Decrypt one `(left, right)` word pair
    pub fn decrypt_pair(&self, left: u32, right: u32) -> (u32, u32) {
        let mut block = [0u8; BLOCK_SIZE];
        block[..4].copy_from_slice(&left.to_le_bytes());
        block[4..].copy_from_slice(&right.to_le_bytes());
        self.decrypt(&mut block);
        (
            u32::from_le_bytes([block[0], block[1], block[2], block[3]]),
            u32::from_le_bytes([block[4], block[5], block[6], block[7]]),
        )
    }

    /// Decrypt whole 8-byte blocks in place, leaving any tail untouched
    pub fn decrypt(&self, data: &mut [u8]) {
        for chunk in data.chunks_exact_mut(BLOCK_SIZE) {
            self.inner.decrypt_block(GenericArray::from_mut_slice(chunk));
        }
    }

    /// Encrypt whole 8-byte blocks in place, leaving any tail untouched
    pub fn encrypt(&self, data: &mut [u8]) {
        for chunk in data.chunks_exact_mut(BLOCK_SIZE) {
            self.inner.encrypt_block(GenericArray::from_mut_slice(chunk));
        }
    }
}
