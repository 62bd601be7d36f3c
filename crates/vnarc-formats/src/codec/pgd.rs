//! Softpal PGD decompressors
//!
//! Both variants share one control stream: a byte with a 0x100 stop bit,
//! consumed LSB first, where a set bit starts a back-reference and a clear
//! bit a literal run.

use super::{CodecError, CodecResult, Input, alloc_output, copy_back, copy_overlapped, truncated};

/// Look-behind window of `PGD/11_C` images
pub const LOOK_BEHIND_11C: usize = 3000;

/// Look-behind window of `PGD/00_C` images
pub const LOOK_BEHIND_00C: usize = 0xFFC;

struct Control<'a> {
    input: Input<'a>,
    ctl: u32,
}

impl<'a> Control<'a> {
    fn new(packed: &'a [u8]) -> Self {
        Self {
            input: Input::new(packed),
            ctl: 1,
        }
    }

    fn next(&mut self) -> Option<bool> {
        if self.ctl == 1 {
            self.ctl = u32::from(self.input.u8()?) | 0x100;
        }
        let bit = self.ctl & 1 != 0;
        self.ctl >>= 1;
        Some(bit)
    }

    fn literal_run(&mut self, out: &mut [u8], dst: usize) -> Option<usize> {
        let count = usize::from(self.input.u8()?).min(out.len() - dst);
        let bytes = self.input.take(count)?;
        out[dst..dst + count].copy_from_slice(bytes);
        Some(count)
    }
}

/// Unpack the windowed variant used by `11_C` and `00_C` images
///
/// Copy sources are measured from the start of a window that trails the
/// output by `look_behind` bytes.
pub fn unpack_window(packed: &[u8], len: usize, look_behind: usize) -> CodecResult<Vec<u8>> {
    let mut out = alloc_output(len)?;
    let mut ctl = Control::new(packed);
    let mut dst = 0;

    while dst < len {
        let is_copy = ctl.next().ok_or_else(|| truncated(len, dst))?;
        if is_copy {
            let v = usize::from(ctl.input.u16_le().ok_or_else(|| truncated(len, dst))?);
            let count = (v & 0xF) + 3;
            let src = dst.saturating_sub(look_behind) + (v >> 4);
            if src >= dst {
                return Err(CodecError::InvalidBackReference {
                    position: dst,
                    distance: src,
                });
            }
            dst += copy_overlapped(&mut out, src, dst, count);
        } else {
            dst += ctl
                .literal_run(&mut out, dst)
                .ok_or_else(|| truncated(len, dst))?;
        }
    }

    Ok(out)
}

/// Unpack the compact `PGD/GE` variant
pub fn unpack_ge(packed: &[u8], len: usize) -> CodecResult<Vec<u8>> {
    let mut out = alloc_output(len)?;
    let mut ctl = Control::new(packed);
    let mut dst = 0;

    while dst < len {
        let is_copy = ctl.next().ok_or_else(|| truncated(len, dst))?;
        if is_copy {
            let v = usize::from(ctl.input.u16_le().ok_or_else(|| truncated(len, dst))?);
            let count = if v & 8 != 0 {
                (v & 7) + 4
            } else {
                usize::from(ctl.input.u8().ok_or_else(|| truncated(len, dst))?) + 4
            };
            dst += copy_back(&mut out, dst, v >> 4, count)?;
        } else {
            dst += ctl
                .literal_run(&mut out, dst)
                .ok_or_else(|| truncated(len, dst))?;
        }
    }

    Ok(out)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_window_literal_then_copy() {
        // ctl 0b10: literal run of 3, then copy from window start + 0, count 6
        let packed = [0b10, 3, b'x', b'y', b'z', 0x03, 0x00];
        let out = unpack_window(&packed, 9, LOOK_BEHIND_11C).unwrap();
        assert_eq!(out, b"xyzxyzxyz");
    }

    #[test]
    fn test_window_source_follows_look_behind() {
        let data: Vec<u8> = (0..20u8).collect();
        // literal run of 20, then copy count 3 from (20 - 8) + 1 = 13
        let mut packed = vec![0b10, 20];
        packed.extend(&data);
        packed.extend([0x10, 0x00]);
        let out = unpack_window(&packed, 23, 8).unwrap();
        assert_eq!(&out[20..], &[13, 14, 15]);
    }

    #[test]
    fn test_window_rejects_forward_source() {
        // copy from window start + 5 with only 1 byte produced
        let packed = [0b10, 1, b'a', 0x50, 0x00];
        assert!(matches!(
            unpack_window(&packed, 8, LOOK_BEHIND_00C),
            Err(CodecError::InvalidBackReference { .. })
        ));
    }

    #[test]
    fn test_ge_short_and_long_counts() {
        // literal "ab", copy distance 2 count (1 & 7) + 4 = 5,
        // copy distance 1 with extension byte 2 -> count 6
        let packed = [0b110, 2, b'a', b'b', 0x29, 0x00, 0x10, 0x00, 2];
        let out = unpack_ge(&packed, 13).unwrap();
        assert_eq!(out, b"abababaaaaaaa");
    }

    #[test]
    fn test_truncated() {
        let packed = [0b0, 4, b'a', b'b'];
        assert_eq!(
            unpack_ge(&packed, 4),
            Err(CodecError::Truncated {
                expected: 4,
                produced: 0
            })
        );
        assert!(unpack_window(&[], 1, LOOK_BEHIND_11C).is_err());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn ge_literals_only(data in proptest::collection::vec(any::<u8>(), 1..200)) {
                // one literal run per control bit, runs of at most 255
                let mut packed = Vec::new();
                for group in data.chunks(255 * 8) {
                    packed.push(0);
                    for run in group.chunks(255) {
                        packed.push(run.len() as u8);
                        packed.extend(run);
                    }
                }
                prop_assert_eq!(unpack_ge(&packed, data.len()).unwrap(), data);
            }
        }
    }
}
