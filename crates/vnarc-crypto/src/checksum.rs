//! Integrity checksums used by archive indices
//!
//! - [`crc32`]: reflected CRC-32 (zlib polynomial), backed by `flate2`
//! - [`Adler32`]: streaming Adler-32 as used by zlib streams
//! - [`crc32_normal_key`]: the MSB-first CRC variant CatSystem2 uses to turn
//!   a passphrase into a 32-bit key

use flate2::Crc;

const ADLER_MOD: u32 = 65521;
/// Largest byte run before the Adler sums must be reduced to stay below 2^32
const ADLER_NMAX: usize = 5552;

/// Compute the standard CRC-32 of `data`
///
/// ```
/// use vnarc_crypto::checksum::crc32;
///
/// assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
/// ```
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = Crc::new();
    crc.update(data);
    crc.sum()
}

/// Streaming Adler-32 checksum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adler32 {
    a: u32,
    b: u32,
}

impl Default for Adler32 {
    fn default() -> Self {
        Self::new()
    }
}

impl Adler32 {
    /// Create a checksum in its initial state
    pub const fn new() -> Self {
        Self { a: 1, b: 0 }
    }

    /// Feed more bytes into the checksum
    pub fn update(&mut self, data: &[u8]) {
        for chunk in data.chunks(ADLER_NMAX) {
            for &byte in chunk {
                self.a += u32::from(byte);
                self.b += self.a;
            }
            self.a %= ADLER_MOD;
            self.b %= ADLER_MOD;
        }
    }

    /// Current checksum value
    pub const fn finish(&self) -> u32 {
        (self.b << 16) | self.a
    }
}

/// One-shot Adler-32 of `data`
pub fn adler32(data: &[u8]) -> u32 {
    let mut sum = Adler32::new();
    sum.update(data);
    sum.finish()
}

const fn build_normal_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut c = (i as u32) << 24;
        let mut bit = 0;
        while bit < 8 {
            c = if c & 0x8000_0000 != 0 {
                (c << 1) ^ 0x04C1_1DB7
            } else {
                c << 1
            };
            bit += 1;
        }
        table[i] = c;
        i += 1;
    }
    table
}

/// Non-reflected CRC-32 lookup table (polynomial 0x04C11DB7)
static CRC32_NORMAL_TABLE: [u32; 256] = build_normal_table();

/// Hash a passphrase into a 32-bit key with the MSB-first CRC-32 table
///
/// Every step complements the register, so this is not a plain CRC-32/BZIP2.
pub fn crc32_normal_key(data: &[u8]) -> u32 {
    data.iter().fold(0xFFFF_FFFF_u32, |key, &c| {
        !CRC32_NORMAL_TABLE[((key >> 24) ^ u32::from(c)) as usize & 0xFF] ^ (key << 8)
    })
}
