//! Studio Jikkenshitsu block cipher
//!
//! A 16-round Feistel network over 64-bit blocks. The round function XORs
//! each input nibble with a 4-bit subkey, substitutes it through one of
//! eight 4-bit S-boxes and permutes the 32 result bits. Subkeys come from a
//! 128-bit key register rotated before every round and sampled through a
//! fixed 32-entry selection table.
//!
//! Only whole 8-byte blocks are transformed; a trailing partial block is left
//! untouched.

use crate::error::CryptoError;

/// Block size in bytes
pub const BLOCK_SIZE: usize = 8;
/// Longest accepted key
pub const MAX_KEY_SIZE: usize = 16;
const ROUNDS: usize = 16;

const SBOX: [[u8; 16]; 8] = [
    [13, 4, 15, 0, 1, 8, 7, 3, 14, 10, 12, 2, 9, 11, 5, 6],
    [5, 0, 10, 2, 4, 1, 14, 8, 13, 12, 11, 9, 3, 15, 7, 6],
    [15, 10, 9, 6, 3, 5, 7, 1, 14, 12, 2, 0, 8, 4, 13, 11],
    [0, 2, 14, 8, 15, 13, 7, 5, 3, 10, 12, 1, 9, 6, 11, 4],
    [8, 2, 12, 5, 10, 13, 6, 9, 0, 14, 7, 3, 15, 1, 4, 11],
    [2, 9, 10, 15, 1, 7, 8, 13, 5, 0, 6, 11, 3, 4, 12, 14],
    [12, 10, 15, 4, 11, 1, 8, 14, 9, 5, 6, 7, 3, 2, 13, 0],
    [5, 10, 11, 7, 3, 0, 8, 4, 12, 6, 15, 9, 13, 14, 2, 1],
];

/// Output bit `i` (MSB first) takes input bit `PERMUTATION[i]`
const PERMUTATION: [u8; 32] = [
    10, 16, 11, 1, 25, 12, 22, 4, 30, 26, 14, 18, 23, 6, 27, 13, 17, 7, 24, 5, 15, 28, 19, 2, 21,
    20, 31, 8, 3, 0, 9, 29,
];

/// Key register bits (MSB first) feeding the 32 subkey bits of a round
const KEY_SELECTION: [u8; 32] = [
    81, 83, 24, 50, 105, 9, 120, 61, 108, 73, 46, 7, 43, 106, 76, 89, 101, 38, 39, 4, 97, 36, 90,
    34, 17, 14, 8, 99, 84, 107, 55, 70,
];

const ROUND_SHIFTS: [u32; ROUNDS] = [1, 1, 2, 2, 2, 2, 2, 2, 1, 2, 2, 2, 2, 2, 2, 1];

/// Expanded key schedule: 8 nibble subkeys for each of the 16 rounds
#[derive(Clone, PartialEq, Eq)]
pub struct SjTransform {
    schedule: [[u8; 8]; ROUNDS],
}

impl std::fmt::Debug for SjTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SjTransform").finish_non_exhaustive()
    }
}

impl SjTransform {
    /// Expand a key of 1 to 16 bytes; shorter keys are zero padded
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        if key.is_empty() {
            return Err(CryptoError::EmptyKey);
        }
        if key.len() > MAX_KEY_SIZE {
            return Err(CryptoError::InvalidKeySize {
                max: MAX_KEY_SIZE,
                actual: key.len(),
            });
        }

        let mut padded = [0u8; MAX_KEY_SIZE];
        padded[..key.len()].copy_from_slice(key);
        let mut register = u128::from_be_bytes(padded);

        let mut schedule = [[0u8; 8]; ROUNDS];
        for (round, shift) in schedule.iter_mut().zip(ROUND_SHIFTS) {
            register = register.rotate_left(shift);
            let mut selected = 0u32;
            for (j, &bit) in KEY_SELECTION.iter().enumerate() {
                if (register >> (127 - u32::from(bit))) & 1 != 0 {
                    selected |= 1 << (31 - j);
                }
            }
            for (n, nibble) in round.iter_mut().enumerate() {
                *nibble = ((selected >> (28 - 4 * n)) & 0xF) as u8;
            }
        }

        Ok(Self { schedule })
    }

    /// Parse a hex encoded key
    pub fn from_hex(hex_str: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(hex_str.trim())?;
        Self::new(&bytes)
    }

    fn round_function(half: u32, subkey: &[u8; 8]) -> u32 {
        let mut substituted = 0u32;
        for (n, (sbox, &k)) in SBOX.iter().zip(subkey).enumerate() {
            let shift = 28 - 4 * n;
            let nibble = ((half >> shift) & 0xF) as u8 ^ k;
            substituted |= u32::from(sbox[usize::from(nibble)]) << shift;
        }

        let mut permuted = 0u32;
        for (i, &src) in PERMUTATION.iter().enumerate() {
            if (substituted >> (31 - u32::from(src))) & 1 != 0 {
                permuted |= 1 << (31 - i);
            }
        }
        permuted
    }

    fn process_block<'a>(block: &mut [u8], subkeys: impl Iterator<Item = &'a [u8; 8]>) {
        let mut left = u32::from_be_bytes([block[0], block[1], block[2], block[3]]);
        let mut right = u32::from_be_bytes([block[4], block[5], block[6], block[7]]);
        for subkey in subkeys {
            let next = left ^ Self::round_function(right, subkey);
            left = right;
            right = next;
        }
        block[..4].copy_from_slice(&right.to_be_bytes());
        block[4..].copy_from_slice(&left.to_be_bytes());
    }

    /// Decrypt whole blocks of `data` in place
    pub fn decrypt(&self, data: &mut [u8]) {
        for block in data.chunks_exact_mut(BLOCK_SIZE) {
            Self::process_block(block, self.schedule.iter().rev());
        }
    }

    /// Encrypt whole blocks of `data` in place
    pub fn encrypt(&self, data: &mut [u8]) {
        for block in data.chunks_exact_mut(BLOCK_SIZE) {
            Self::process_block(block, self.schedule.iter());
        }
    }
}
