//! RMSK 8-bit masks
//!
//! Prefix codes over an MSB-first bitstream: `0` repeats the previous
//! value, `10` is 0x00, `110` is 0xFF and `111` is followed by a literal
//! byte. The previous value starts at zero.

use binrw::BinRead;
use binrw::io::Cursor;

use crate::bitstream::MsbBitStream;
use crate::codec::{CodecError, alloc_output};
use crate::error::{Result, header_mismatch};
use crate::image::{ChannelOrder, ImageFrame, check_dimensions};

/// Size of the fixed header
pub const HEADER_SIZE: usize = 0xC;

/// RMSK header
#[derive(Debug, Clone, PartialEq, Eq, BinRead)]
#[br(little, magic = b"RMSK")]
pub struct RmskHeader {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

fn unpack(bits: &mut MsbBitStream<'_>, len: usize) -> Result<Vec<u8>> {
    let mut out = alloc_output(len)?;
    let truncated = |produced| CodecError::Truncated {
        expected: len,
        produced,
    };
    let mut last = 0u8;
    for (i, slot) in out.iter_mut().enumerate() {
        let mut bit = || bits.get_next_bit().ok_or(truncated(i));
        if bit()? {
            last = if !bit()? {
                0x00
            } else if !bit()? {
                0xFF
            } else {
                bits.get_bits(8).ok_or(truncated(i))? as u8
            };
        }
        *slot = last;
    }
    Ok(out)
}

/// Decode an RMSK mask
pub fn decode(data: &[u8]) -> Result<ImageFrame> {
    let header = RmskHeader::read(&mut Cursor::new(data)).map_err(header_mismatch)?;
    check_dimensions(header.width, header.height)?;
    let len = header.width as usize * header.height as usize;
    let mut bits = MsbBitStream::new(&data[HEADER_SIZE..]);
    let pixels = unpack(&mut bits, len)?;
    ImageFrame::packed(header.width, header.height, ChannelOrder::Gray, pixels)
}
