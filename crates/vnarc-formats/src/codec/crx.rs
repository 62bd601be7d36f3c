//! Circus CRX v1 decompressor
//!
//! Back-references index a 64 KiB ring that starts zeroed, so a reference
//! reaching before the first output byte reads zeros instead of failing.

use super::{CodecResult, Input, alloc_output, truncated};

const WINDOW_SIZE: usize = 0x10000;
const WINDOW_MASK: usize = WINDOW_SIZE - 1;

/// Read one back-reference token, returning `(offset, count)`
fn reference(input: &mut Input<'_>, control: u8) -> Option<(usize, usize)> {
    let c = usize::from(control);
    let token = if control >= 0xC0 {
        let offset = ((c & 3) << 8) | usize::from(input.u8()?);
        (offset, 4 + ((c >> 2) & 0xF))
    } else if control & 0x80 != 0 {
        let offset = match c & 0x1F {
            0 => usize::from(input.u8()?),
            low => low,
        };
        (offset, 2 + ((c >> 5) & 3))
    } else if control == 0x7F {
        let count = 2 + usize::from(input.u16_le()?);
        (usize::from(input.u16_le()?), count)
    } else {
        (usize::from(input.u16_le()?), c + 4)
    };
    Some(token)
}

/// Unpack a compression-1 CRX pixel stream into `len` bytes
pub fn unpack_v1(packed: &[u8], len: usize) -> CodecResult<Vec<u8>> {
    let mut out = alloc_output(len)?;
    let mut window = vec![0u8; WINDOW_SIZE];
    let mut input = Input::new(packed);
    let mut win_pos = 0usize;
    let mut flags = 0u32;
    let mut dst = 0;

    while dst < len {
        flags >>= 1;
        if flags & 0x100 == 0 {
            let b = input.u8().ok_or_else(|| truncated(len, dst))?;
            flags = u32::from(b) | 0xFF00;
        }

        if flags & 1 != 0 {
            let b = input.u8().ok_or_else(|| truncated(len, dst))?;
            window[win_pos] = b;
            win_pos = (win_pos + 1) & WINDOW_MASK;
            out[dst] = b;
            dst += 1;
            continue;
        }

        let control = input.u8().ok_or_else(|| truncated(len, dst))?;
        let (offset, count) =
            reference(&mut input, control).ok_or_else(|| truncated(len, dst))?;
        let mut src = win_pos.wrapping_sub(offset) & WINDOW_MASK;
        for _ in 0..count.min(len - dst) {
            let b = window[src];
            src = (src + 1) & WINDOW_MASK;
            window[win_pos] = b;
            win_pos = (win_pos + 1) & WINDOW_MASK;
            out[dst] = b;
            dst += 1;
        }
    }

    Ok(out)
}
