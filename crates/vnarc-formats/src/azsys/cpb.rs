//! `CPB\x1A` images
//!
//! The header is followed by one record per channel, stored as alpha (32 bpp
//! only), red, green, blue. Each record is a CRC32 of the unpacked channel
//! and the channel data, raw or AZ-packed.

use binrw::BinRead;
use binrw::io::Cursor;
use vnarc_crypto::crc32;

use crate::codec;
use crate::error::{Error, Result, header_mismatch};
use crate::image::{ChannelOrder, ImageFrame, check_dimensions, interleave_planes};

/// Size of the fixed header
pub const HEADER_SIZE: usize = 0x1A;

/// CPB header
#[derive(Debug, Clone, PartialEq, Eq, BinRead)]
#[br(little)]
pub struct CpbHeader {
    /// Signature, always `CPB\x1A`
    #[br(assert(magic == *b"CPB\x1A", "Invalid CPB magic: {:?}", magic))]
    pub magic: [u8; 4],
    /// 0 raw, 1 AZ-packed
    pub kind: u8,
    /// 24 or 32
    pub bpp: u8,
    /// Width in pixels
    pub width: u16,
    /// Height in pixels
    pub height: u16,
    /// Stored length of each channel record after its CRC, in A, R, G, B order
    pub channel_len: [u32; 4],
}

/// Decode a CPB image
pub fn decode(data: &[u8]) -> Result<ImageFrame> {
    let header = CpbHeader::read(&mut Cursor::new(data)).map_err(header_mismatch)?;
    let (width, height) = (u32::from(header.width), u32::from(header.height));
    check_dimensions(width, height)?;
    let (order, first_channel) = match header.bpp {
        24 => (ChannelOrder::Bgr, 1),
        32 => (ChannelOrder::Bgra, 0),
        bpp => return Err(Error::unsupported("CPB bit depth", bpp)),
    };
    if header.kind > 1 {
        return Err(Error::unsupported("CPB compression", header.kind));
    }

    let plane_len = width as usize * height as usize;
    let mut pos = HEADER_SIZE;
    let mut planes: [Vec<u8>; 4] = Default::default();
    for channel in first_channel..4 {
        let stored = header.channel_len[channel] as usize;
        let record = pos
            .checked_add(4 + stored)
            .and_then(|end| data.get(pos..end))
            .ok_or_else(|| Error::CorruptData(format!("CPB channel {channel} truncated")))?;
        let expected_crc = u32::from_le_bytes([record[0], record[1], record[2], record[3]]);
        let body = &record[4..];
        let plane = if header.kind == 1 {
            codec::azsys::unpack(body, plane_len)?
        } else {
            body.get(..plane_len)
                .ok_or_else(|| Error::CorruptData(format!("CPB channel {channel} short")))?
                .to_vec()
        };
        if crc32(&plane) != expected_crc {
            return Err(Error::CorruptData(format!("CPB channel {channel} CRC mismatch")));
        }
        planes[channel] = plane;
        pos += 4 + stored;
    }

    let [a, r, g, b] = &planes;
    let pixels = if order == ChannelOrder::Bgra {
        interleave_planes(&[b.as_slice(), g.as_slice(), r.as_slice(), a.as_slice()])
    } else {
        interleave_planes(&[b.as_slice(), g.as_slice(), r.as_slice()])
    };
    ImageFrame::packed(width, height, order, pixels)
}
