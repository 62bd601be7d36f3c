//! AZ System LZ codec
//!
//! A control byte precedes every group of eight tokens and is scanned from
//! its most significant bit. A set bit is a back-reference stored as a
//! big-endian `u16` (13-bit distance minus one, 3-bit length minus three);
//! a clear bit is a literal run whose length minus one is the next byte.
//!
//! ARC indices, ASB scripts and every CPB/TYP1 image channel use it.

use super::{CodecResult, Input, alloc_output, copy_back, truncated};

/// Unpack `packed` into exactly `len` bytes
pub fn unpack(packed: &[u8], len: usize) -> CodecResult<Vec<u8>> {
    let mut out = alloc_output(len)?;
    let mut input = Input::new(packed);
    let mut dst = 0;

    while dst < len {
        let ctl = input.u8().ok_or(truncated(len, dst))?;
        for bit in (0..8).rev() {
            if dst >= len {
                break;
            }
            if ctl & (1 << bit) != 0 {
                let token = input.u16_be().ok_or(truncated(len, dst))?;
                let distance = usize::from(token >> 3) + 1;
                let count = usize::from(token & 7) + 3;
                dst += copy_back(&mut out, dst, distance, count)?;
            } else {
                let run = input.u8().ok_or(truncated(len, dst))?;
                let count = (usize::from(run) + 1).min(len - dst);
                let bytes = input.take(count).ok_or(truncated(len, dst))?;
                out[dst..dst + count].copy_from_slice(bytes);
                dst += count;
            }
        }
    }

    Ok(out)
}

/// Literal-only encoder for building test fixtures
#[cfg(test)]
pub(crate) fn pack_literals(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let runs: Vec<&[u8]> = data.chunks(256).collect();
    for group in runs.chunks(8) {
        out.push(0);
        for run in group {
            out.push((run.len() - 1) as u8);
            out.extend_from_slice(run);
        }
    }
    out
}
