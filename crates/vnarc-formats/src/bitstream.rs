//! Bit readers over byte slices
//!
//! Three bit orders appear across the engines:
//!
//! - [`MsbBitStream`]: bit 7 of each byte first, multi-bit values MSB first
//! - [`LsbBitStream`]: bit 0 of each byte first, multi-bit values LSB first
//! - [`ReverseBitStream`]: bytes consumed from the end of the slice towards
//!   the start, each shifted into an accumulator whose highest bits are
//!   returned first
//!
//! Every reader returns `None` once the input is exhausted and never reads
//! past the end of its slice. Reads wider than 32 bits are rejected.

/// Widest value a single `get_bits` call returns
pub const MAX_BITS: u32 = 32;

const fn low_mask(n: u32) -> u64 {
    (1u64 << n) - 1
}

/// MSB-first bit reader
#[derive(Debug, Clone)]
pub struct MsbBitStream<'a> {
    data: &'a [u8],
    pos: usize,
    cache: u64,
    cached: u32,
}

impl<'a> MsbBitStream<'a> {
    /// Create a reader positioned at the first byte
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            cache: 0,
            cached: 0,
        }
    }

    /// Read `n` bits, first bit most significant
    pub fn get_bits(&mut self, n: u32) -> Option<u32> {
        if n > MAX_BITS {
            return None;
        }
        while self.cached < n {
            let byte = *self.data.get(self.pos)?;
            self.pos += 1;
            self.cache = (self.cache << 8) | u64::from(byte);
            self.cached += 8;
        }
        self.cached -= n;
        let value = (self.cache >> self.cached) & low_mask(n);
        self.cache &= low_mask(self.cached);
        Some(value as u32)
    }

    /// Read a single bit
    pub fn get_next_bit(&mut self) -> Option<bool> {
        self.get_bits(1).map(|b| b != 0)
    }

    /// Number of bytes consumed so far
    pub fn byte_position(&self) -> usize {
        self.pos
    }

    /// Drop the unread bits of the current byte
    pub fn align_to_byte(&mut self) {
        self.cache = 0;
        self.cached = 0;
    }
}

/// LSB-first bit reader
#[derive(Debug, Clone)]
pub struct LsbBitStream<'a> {
    data: &'a [u8],
    pos: usize,
    cache: u64,
    cached: u32,
}

impl<'a> LsbBitStream<'a> {
    /// Create a reader positioned at the first byte
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            cache: 0,
            cached: 0,
        }
    }

    /// Read `n` bits, first bit least significant
    pub fn get_bits(&mut self, n: u32) -> Option<u32> {
        if n > MAX_BITS {
            return None;
        }
        while self.cached < n {
            let byte = *self.data.get(self.pos)?;
            self.pos += 1;
            self.cache |= u64::from(byte) << self.cached;
            self.cached += 8;
        }
        let value = self.cache & low_mask(n);
        self.cache >>= n;
        self.cached -= n;
        Some(value as u32)
    }

    /// Read a single bit
    pub fn get_next_bit(&mut self) -> Option<bool> {
        self.get_bits(1).map(|b| b != 0)
    }

    /// Number of bytes consumed so far
    pub fn byte_position(&self) -> usize {
        self.pos
    }
}

/// Bit reader consuming bytes from the end of the slice
#[derive(Debug, Clone)]
pub struct ReverseBitStream<'a> {
    data: &'a [u8],
    pos: usize,
    cache: u64,
    cached: u32,
}

impl<'a> ReverseBitStream<'a> {
    /// Create a reader positioned after the last byte
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: data.len(),
            cache: 0,
            cached: 0,
        }
    }

    /// Read the highest `n` unread bits of the accumulator
    pub fn get_bits(&mut self, n: u32) -> Option<u32> {
        if n > MAX_BITS {
            return None;
        }
        while self.cached < n {
            self.pos = self.pos.checked_sub(1)?;
            self.cache = (self.cache << 8) | u64::from(self.data[self.pos]);
            self.cached += 8;
        }
        self.cached -= n;
        let value = (self.cache >> self.cached) & low_mask(n);
        self.cache &= low_mask(self.cached);
        Some(value as u32)
    }

    /// Read a single bit
    pub fn get_next_bit(&mut self) -> Option<bool> {
        self.get_bits(1).map(|b| b != 0)
    }

    /// Offset of the lowest byte consumed so far
    pub fn byte_position(&self) -> usize {
        self.pos
    }
}
