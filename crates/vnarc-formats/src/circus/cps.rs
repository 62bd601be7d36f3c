//! `CPS` images
//!
//! An LZ stream split in two: literal bytes run forward from the header, and
//! the control bits sit in the last `ctl_len` bytes, read back to front.

use binrw::BinRead;
use binrw::io::Cursor;

use crate::bitstream::ReverseBitStream;
use crate::codec::{CodecError, Input, alloc_output, copy_back};
use crate::error::{Error, Result, header_mismatch};
use crate::image::{ChannelOrder, ImageFrame, check_dimensions};

/// Size of the fixed header
pub const HEADER_SIZE: usize = 0x12;

/// CPS header
#[derive(Debug, Clone, PartialEq, Eq, BinRead)]
#[br(little)]
pub struct CpsHeader {
    /// Signature, always `CPS\0`
    #[br(assert(magic == *b"CPS\0", "Invalid CPS magic: {:?}", magic))]
    pub magic: [u8; 4],
    /// Unpacked pixel bytes
    pub unpacked: u32,
    /// Width in pixels
    pub width: u16,
    /// Height in pixels
    pub height: u16,
    /// 8, 24 or 32
    pub bpp: u16,
    /// Length of the trailing control block
    pub ctl_len: u32,
}

fn unpack(literals: &[u8], ctl: &[u8], len: usize) -> Result<Vec<u8>> {
    let mut out = alloc_output(len)?;
    let mut bits = ReverseBitStream::new(ctl);
    let mut input = Input::new(literals);
    let truncated = |dst| {
        Error::Codec(CodecError::Truncated {
            expected: len,
            produced: dst,
        })
    };

    let mut dst = 0;
    while dst < len {
        if bits.get_next_bit().ok_or_else(|| truncated(dst))? {
            out[dst] = input.u8().ok_or_else(|| truncated(dst))?;
            dst += 1;
        } else {
            let count = bits.get_bits(4).ok_or_else(|| truncated(dst))? as usize + 2;
            let distance = bits.get_bits(12).ok_or_else(|| truncated(dst))? as usize + 1;
            dst += copy_back(&mut out, dst, distance, count)?;
        }
    }
    Ok(out)
}

/// Decode a CPS image
pub fn decode(data: &[u8]) -> Result<ImageFrame> {
    let header = CpsHeader::read(&mut Cursor::new(data)).map_err(header_mismatch)?;
    let (width, height) = (u32::from(header.width), u32::from(header.height));
    check_dimensions(width, height)?;
    let order = match header.bpp {
        8 => ChannelOrder::Gray,
        24 => ChannelOrder::Bgr,
        32 => ChannelOrder::Bgra,
        bpp => return Err(Error::unsupported("CPS bit depth", bpp)),
    };
    let len = width as usize * height as usize * order.bytes_per_pixel();
    if header.unpacked as usize != len {
        return Err(Error::CorruptData(format!(
            "CPS unpacked size {} does not match {width}x{height}",
            header.unpacked
        )));
    }

    let body = &data[HEADER_SIZE..];
    let split = body
        .len()
        .checked_sub(header.ctl_len as usize)
        .ok_or_else(|| Error::CorruptData("CPS control block exceeds the file".into()))?;
    let (literals, ctl) = body.split_at(split);
    let pixels = unpack(literals, ctl, len)?;
    ImageFrame::packed(width, height, order, pixels)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Control bits written MSB first, stored back to front
    #[derive(Default)]
    struct ControlWriter {
        bytes: Vec<u8>,
        used: u32,
    }

    impl ControlWriter {
        fn bits(&mut self, value: u32, n: u32) {
            for i in (0..n).rev() {
                if self.used % 8 == 0 {
                    self.bytes.push(0);
                }
                if value >> i & 1 != 0 {
                    *self.bytes.last_mut().unwrap() |= 0x80 >> (self.used % 8);
                }
                self.used += 1;
            }
        }

        fn finish(mut self) -> Vec<u8> {
            self.bytes.reverse();
            self.bytes
        }
    }

    fn build(width: u16, height: u16, bpp: u16, literals: &[u8], ctl: &[u8]) -> Vec<u8> {
        let unpacked = u32::from(width) * u32::from(height) * u32::from(bpp / 8);
        let mut out = b"CPS\0".to_vec();
        out.extend_from_slice(&unpacked.to_le_bytes());
        out.extend_from_slice(&width.to_le_bytes());
        out.extend_from_slice(&height.to_le_bytes());
        out.extend_from_slice(&bpp.to_le_bytes());
        out.extend_from_slice(&(ctl.len() as u32).to_le_bytes());
        out.extend_from_slice(literals);
        out.extend_from_slice(ctl);
        out
    }

    #[test]
    fn test_literals_and_copy() {
        let mut ctl = ControlWriter::default();
        ctl.bits(0b11, 2);
        ctl.bits(0, 1);
        ctl.bits(2, 4);
        ctl.bits(1, 12);
        let data = build(6, 1, 8, b"AB", &ctl.finish());
        let frame = decode(&data).unwrap();
        assert_eq!(frame.channel_order, ChannelOrder::Gray);
        assert_eq!(frame.pixels, b"ABABAB");
    }

    #[test]
    fn test_24bpp_literals() {
        let mut ctl = ControlWriter::default();
        ctl.bits(0b111, 3);
        let data = build(1, 1, 24, &[1, 2, 3], &ctl.finish());
        assert_eq!(decode(&data).unwrap().pixels, [1, 2, 3]);
    }

    #[test]
    fn test_copy_before_start() {
        let mut ctl = ControlWriter::default();
        ctl.bits(0, 1);
        ctl.bits(0, 4);
        ctl.bits(0, 12);
        let data = build(2, 1, 8, b"", &ctl.finish());
        assert!(decode(&data).unwrap_err().is_entry_local());
    }

    #[test]
    fn test_truncated_control() {
        let mut ctl = ControlWriter::default();
        ctl.bits(0b1, 1);
        let data = build(16, 1, 8, b"A", &ctl.finish());
        assert!(decode(&data).unwrap_err().is_truncated());
    }

    #[test]
    fn test_size_mismatch() {
        let mut data = build(2, 2, 8, b"", &[]);
        data[4] = 5;
        assert!(matches!(decode(&data), Err(Error::CorruptData(_))));
    }
}
