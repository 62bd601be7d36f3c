//! Sas5 IAR image codec
//!
//! Control bits come from a 16-bit little-endian cache that is refilled
//! from the same byte stream as literals and offsets, so a refill can fall
//! between any two tokens. The token grammar is a fixed prefix code:
//!
//! | prefix | meaning |
//! |--------|---------|
//! | `1`    | literal byte |
//! | `01`   | long copy, 5-way distance code then 8-way length code |
//! | `00`   | two-byte copy; distance `byte + 1` or, after a `1`, an extended distance |
//!
//! An extended two-byte distance of exactly 0x100 ends the stream.

use super::{CodecResult, Input, alloc_output, copy_back, truncated};

/// Extended short-copy distance that terminates the stream
const END_OF_STREAM: usize = 0x100;

struct BitCache<'a> {
    input: Input<'a>,
    bits: u32,
}

impl<'a> BitCache<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            input: Input::new(data),
            bits: 1,
        }
    }

    fn bit(&mut self) -> Option<usize> {
        if self.bits == 1 {
            self.bits = u32::from(self.input.u16_le()?) | 0x1_0000;
        }
        let bit = (self.bits & 1) as usize;
        self.bits >>= 1;
        Some(bit)
    }

    /// `n` bits, first bit most significant
    fn bits(&mut self, n: u32) -> Option<usize> {
        (0..n).try_fold(0, |acc, _| Some((acc << 1) | self.bit()?))
    }

    fn byte(&mut self) -> Option<usize> {
        self.input.u8().map(usize::from)
    }
}

fn long_distance(cache: &mut BitCache<'_>) -> Option<usize> {
    let (base, extra) = if cache.bit()? == 1 {
        (0x001, 1)
    } else if cache.bit()? == 1 {
        (0x201, 1)
    } else if cache.bit()? == 1 {
        (0x401, 2)
    } else if cache.bit()? == 1 {
        (0x801, 3)
    } else {
        (0x1001, 4)
    };
    let high = cache.bits(extra)?;
    Some(base + (high << 8) + cache.byte()?)
}

fn long_length(cache: &mut BitCache<'_>) -> Option<usize> {
    if cache.bit()? == 1 {
        return Some(3);
    }
    if cache.bit()? == 1 {
        return Some(4);
    }
    if cache.bit()? == 1 {
        return Some(5);
    }
    if cache.bit()? == 1 {
        return Some(6);
    }
    if cache.bit()? == 1 {
        return Some(7 + cache.bit()?);
    }
    if cache.bit()? == 1 {
        return Some(9 + cache.bits(3)?);
    }
    if cache.bit()? == 1 {
        return Some(17 + cache.byte()?);
    }
    let lo = cache.byte()?;
    let hi = cache.byte()?;
    Some(0x112 + (lo | (hi << 8)))
}

/// Unpack `packed` into `len` bytes
///
/// Output past the end-of-stream marker stays zero.
pub fn unpack(packed: &[u8], len: usize) -> CodecResult<Vec<u8>> {
    let mut out = alloc_output(len)?;
    let mut cache = BitCache::new(packed);
    let mut dst = 0;

    while dst < len {
        let fail = || truncated(len, dst);
        if cache.bit().ok_or_else(fail)? == 1 {
            out[dst] = cache.byte().ok_or_else(fail)? as u8;
            dst += 1;
            continue;
        }

        if cache.bit().ok_or_else(fail)? == 1 {
            let distance = long_distance(&mut cache).ok_or_else(fail)?;
            let count = long_length(&mut cache).ok_or_else(fail)?;
            dst += copy_back(&mut out, dst, distance, count)?;
            continue;
        }

        let distance = if cache.bit().ok_or_else(fail)? == 1 {
            let high = cache.bits(3).ok_or_else(fail)?;
            let low = cache.byte().ok_or_else(fail)?;
            let distance = ((high << 8) | low) + 0x100;
            if distance == END_OF_STREAM {
                break;
            }
            distance
        } else {
            cache.byte().ok_or_else(fail)? + 1
        };
        dst += copy_back(&mut out, dst, distance, 2)?;
    }

    Ok(out)
}

/// Bit writer mirroring the decoder's interleaved refills, for tests
#[cfg(test)]
pub(crate) struct IarWriter {
    out: Vec<u8>,
    slot: usize,
    used: u32,
}

#[cfg(test)]
impl IarWriter {
    pub(crate) fn new() -> Self {
        Self {
            out: Vec::new(),
            slot: 0,
            used: 16,
        }
    }

    pub(crate) fn bit(&mut self, bit: bool) {
        if self.used == 16 {
            self.slot = self.out.len();
            self.out.extend([0, 0]);
            self.used = 0;
        }
        if bit {
            let v = u16::from_le_bytes([self.out[self.slot], self.out[self.slot + 1]])
                | (1 << self.used);
            self.out[self.slot..self.slot + 2].copy_from_slice(&v.to_le_bytes());
        }
        self.used += 1;
    }

    pub(crate) fn bits(&mut self, n: u32, value: usize) {
        for i in (0..n).rev() {
            self.bit((value >> i) & 1 == 1);
        }
    }

    pub(crate) fn byte(&mut self, b: u8) {
        self.out.push(b);
    }

    pub(crate) fn literal(&mut self, b: u8) {
        self.bit(true);
        self.byte(b);
    }

    pub(crate) fn end(&mut self) {
        self.bits(3, 0b001);
        self.bits(3, 0);
        self.byte(0);
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        self.out
    }
}
