//! Decompressors shared by the engine formats
//!
//! Every codec takes the packed bytes and the declared unpacked length,
//! allocates exactly that many bytes and never writes past them. Running out
//! of input before the output is full is [`CodecError::Truncated`].
//!
//! - [`azsys`]: AZ System control-bitmap LZ
//! - [`lzss`]: frame-based Okumura LZSS, with the TinkerBell inverted variant
//! - [`iar`]: Sas5 IAR prefix-coded LZ
//! - [`pgd`]: Softpal PGD look-behind LZ and the compact GE variant
//! - [`crx`]: Circus CRX v1 windowed RLE
//! - [`zlib`]: bounded zlib inflate

pub mod azsys;
pub mod crx;
mod error;
pub mod iar;
pub mod lzss;
pub mod pgd;
pub mod zlib;

pub use error::{CodecError, CodecResult};

/// Largest output any codec will allocate (256 MiB)
pub const MAX_UNPACKED_SIZE: usize = 0x1000_0000;

/// Allocate a zeroed output buffer after checking the size limit
pub(crate) fn alloc_output(len: usize) -> CodecResult<Vec<u8>> {
    if len > MAX_UNPACKED_SIZE {
        return Err(CodecError::TooLarge {
            size: len,
            limit: MAX_UNPACKED_SIZE,
        });
    }
    Ok(vec![0u8; len])
}

/// Copy `count` bytes from `src` to `dst` one at a time so overlapping runs
/// repeat, clipped to the end of `out`
pub(crate) fn copy_overlapped(out: &mut [u8], src: usize, dst: usize, count: usize) -> usize {
    let count = count.min(out.len().saturating_sub(dst));
    for i in 0..count {
        out[dst + i] = out[src + i];
    }
    count
}

/// Copy a back-reference `distance` bytes behind `dst`
pub(crate) fn copy_back(
    out: &mut [u8],
    dst: usize,
    distance: usize,
    count: usize,
) -> CodecResult<usize> {
    if distance == 0 || distance > dst {
        return Err(CodecError::InvalidBackReference {
            position: dst,
            distance,
        });
    }
    Ok(copy_overlapped(out, dst - distance, dst, count))
}

/// Byte cursor over packed input
#[derive(Debug, Clone)]
pub(crate) struct Input<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Input<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn u8(&mut self) -> Option<u8> {
        let b = *self.data.get(self.pos)?;
        self.pos += 1;
        Some(b)
    }

    pub(crate) fn u16_le(&mut self) -> Option<u16> {
        let bytes = self.take(2)?;
        Some(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub(crate) fn u16_be(&mut self) -> Option<u16> {
        let bytes = self.take(2)?;
        Some(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub(crate) fn u32_le(&mut self) -> Option<u32> {
        let bytes = self.take(4)?;
        Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(n)?;
        let bytes = self.data.get(self.pos..end)?;
        self.pos = end;
        Some(bytes)
    }
}

/// Shorthand for the truncation error of a codec
pub(crate) const fn truncated(expected: usize, produced: usize) -> CodecError {
    CodecError::Truncated { expected, produced }
}
