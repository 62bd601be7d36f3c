//! Frame-based LZSS
//!
//! The classic Okumura layout: control bits are consumed least significant
//! first, a set bit is a literal byte and a clear bit is a two-byte
//! reference into a ring frame (12-bit frame position, 4-bit length minus
//! three). The frame starts filled with [`LzssConfig::frame_fill`] and
//! writing begins at [`LzssConfig::frame_init_pos`].
//!
//! TinkerBell archives store every control, literal and reference byte
//! bitwise inverted; [`LzssConfig::TINKERBELL`] undoes that.

use super::{CodecResult, Input, alloc_output, truncated};

/// Frame parameters of an LZSS stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LzssConfig {
    /// Ring frame size in bytes
    pub frame_size: usize,
    /// Initial frame contents
    pub frame_fill: u8,
    /// First frame write position
    pub frame_init_pos: usize,
    /// Every input byte is stored inverted
    pub inverted: bool,
}

impl LzssConfig {
    /// 4 KiB frame, zero filled, writing from 0xFEE
    pub const DEFAULT: Self = Self {
        frame_size: 0x1000,
        frame_fill: 0,
        frame_init_pos: 0xFEE,
        inverted: false,
    };

    /// [`LzssConfig::DEFAULT`] with inverted input bytes
    pub const TINKERBELL: Self = Self {
        inverted: true,
        ..Self::DEFAULT
    };
}

impl Default for LzssConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Unpack `packed` into exactly `len` bytes
pub fn unpack(packed: &[u8], len: usize, config: LzssConfig) -> CodecResult<Vec<u8>> {
    let mut out = alloc_output(len)?;
    let frame_size = config.frame_size.max(1);
    let mut frame = vec![config.frame_fill; frame_size];
    let mut frame_pos = config.frame_init_pos % frame_size;
    let mut input = Input::new(packed);
    let mask = if config.inverted { 0xFF } else { 0x00 };
    let mut next = |dst: usize| input.u8().map(|b| b ^ mask).ok_or(truncated(len, dst));

    let mut dst = 0;
    let mut ctl: u32 = 0;
    while dst < len {
        ctl >>= 1;
        if ctl & 0x100 == 0 {
            ctl = u32::from(next(dst)?) | 0xFF00;
        }

        if ctl & 1 != 0 {
            let b = next(dst)?;
            out[dst] = b;
            dst += 1;
            frame[frame_pos] = b;
            frame_pos = (frame_pos + 1) % frame_size;
        } else {
            let lo = usize::from(next(dst)?);
            let hi = usize::from(next(dst)?);
            let mut offset = lo | ((hi & 0xF0) << 4);
            let count = (hi & 0x0F) + 3;
            for _ in 0..count {
                if dst >= len {
                    break;
                }
                let b = frame[offset % frame_size];
                offset += 1;
                frame[frame_pos] = b;
                frame_pos = (frame_pos + 1) % frame_size;
                out[dst] = b;
                dst += 1;
            }
        }
    }

    Ok(out)
}

/// Literal-only encoder for building test fixtures
#[cfg(test)]
pub(crate) fn pack_literals(data: &[u8], inverted: bool) -> Vec<u8> {
    let mask = if inverted { 0xFF } else { 0x00 };
    let mut out = Vec::new();
    for group in data.chunks(8) {
        out.push(0xFF ^ mask);
        out.extend(group.iter().map(|b| b ^ mask));
    }
    out
}
