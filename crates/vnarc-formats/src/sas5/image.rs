//! IAR image entries
//!
//! Each archive entry is a small header, an optional palette and the pixel
//! data, optionally compressed with [`codec::iar`](crate::codec::iar).

use binrw::BinRead;
use binrw::io::Cursor;

use crate::codec::iar;
use crate::error::{Error, Result, header_mismatch};
use crate::image::{ChannelOrder, Color, ImageFrame};

const DEPTH_MASK: u16 = 0x3E;
const PACKED_FLAG: u16 = 0x800;

/// Entry header length for an archive of the given major version
pub const fn header_len(version: u16) -> usize {
    if version >= 3 { 0x30 } else { 0x28 }
}

/// Fixed part of an IAR entry header
#[derive(Debug, Clone, PartialEq, Eq, BinRead)]
#[br(little)]
pub struct IarImageHeader {
    /// Depth and compression flags
    pub flags: u16,
    /// Unused
    pub reserved: u16,
    /// Pixel bytes after unpacking
    pub unpacked: u32,
    /// Palette bytes following the header
    pub palette_len: u32,
    /// Stored pixel bytes
    pub packed: u32,
    /// Unused
    pub reserved2: u32,
    /// Placement on the screen
    pub offset_x: i32,
    /// Placement on the screen
    pub offset_y: i32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Bytes per row
    pub stride: u32,
}

impl IarImageHeader {
    /// Pixel layout selected by the depth flags
    pub fn channel_order(&self) -> Result<ChannelOrder> {
        match self.flags & DEPTH_MASK {
            0x02 if self.palette_len > 0 => Ok(ChannelOrder::Indexed),
            0x02 => Ok(ChannelOrder::Gray),
            0x1C => Ok(ChannelOrder::Bgr),
            0x3C => Ok(ChannelOrder::Bgra),
            depth => Err(Error::unsupported("IAR image depth", depth)),
        }
    }

    /// Whether the pixels are IAR-compressed
    pub const fn is_packed(&self) -> bool {
        self.flags & PACKED_FLAG != 0
    }
}

/// Decode one IAR entry from an archive of major `version`
pub fn decode(data: &[u8], version: u16) -> Result<ImageFrame> {
    let header = IarImageHeader::read(&mut Cursor::new(data)).map_err(header_mismatch)?;
    let order = header.channel_order()?;
    let stride = header.stride as usize;
    let len = stride * header.height as usize;
    if header.unpacked as usize != len {
        return Err(Error::CorruptData(format!(
            "IAR unpacked size {} does not match stride {} x {}",
            header.unpacked, stride, header.height
        )));
    }

    let mut pos = header_len(version);
    let palette = if header.palette_len > 0 {
        let bytes = data
            .get(pos..pos + header.palette_len as usize)
            .ok_or_else(|| Error::CorruptData("IAR palette truncated".into()))?;
        pos += bytes.len();
        Some(
            bytes
                .chunks_exact(4)
                .map(|q| Color::from_bgra([q[0], q[1], q[2], q[3]]))
                .collect::<Vec<_>>(),
        )
    } else {
        None
    };

    let body = data
        .get(pos..pos + header.packed as usize)
        .ok_or_else(|| Error::CorruptData("IAR pixel data truncated".into()))?;
    let pixels = if header.is_packed() {
        iar::unpack(body, len)?
    } else if body.len() >= len {
        body[..len].to_vec()
    } else {
        return Err(Error::CorruptData(format!(
            "IAR stores {} of {} pixel bytes",
            body.len(),
            len
        )));
    };

    let frame = ImageFrame::new(header.width, header.height, order, stride, pixels)?
        .with_offset(header.offset_x, header.offset_y);
    Ok(match palette {
        Some(palette) => frame.with_palette(palette),
        None => frame,
    })
}
