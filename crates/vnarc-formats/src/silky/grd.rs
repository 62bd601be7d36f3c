//! GRD and IGF images
//!
//! Both share one header and an LZSS pixel stream. GRD rows run top-down,
//! IGF rows bottom-up.

use binrw::BinRead;
use binrw::io::Cursor;

use crate::codec::lzss::{self, LzssConfig};
use crate::error::{Error, Result, header_mismatch};
use crate::image::{ChannelOrder, ImageFrame, check_dimensions, flip_rows};

/// Size of the fixed header
pub const HEADER_SIZE: usize = 0x14;

/// GRD / IGF header
#[derive(Debug, Clone, PartialEq, Eq, BinRead)]
#[br(little)]
pub struct GrdHeader {
    /// `GRD\0` or `IGF\0`
    #[br(assert(&magic == b"GRD\0" || &magic == b"IGF\0", "Invalid GRD magic: {:?}", magic))]
    pub magic: [u8; 4],
    /// Unpacked pixel bytes
    pub unpacked: u32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// 8, 24 or 32
    pub bpp: u32,
}

impl GrdHeader {
    /// Rows are stored bottom-up
    pub fn is_bottom_up(&self) -> bool {
        &self.magic == b"IGF\0"
    }
}

/// Decode a GRD or IGF image
pub fn decode(data: &[u8]) -> Result<ImageFrame> {
    let header = GrdHeader::read(&mut Cursor::new(data)).map_err(header_mismatch)?;
    check_dimensions(header.width, header.height)?;
    let order = match header.bpp {
        8 => ChannelOrder::Gray,
        24 => ChannelOrder::Bgr,
        32 => ChannelOrder::Bgra,
        bpp => return Err(Error::unsupported("GRD bit depth", bpp)),
    };
    let stride = header.width as usize * order.bytes_per_pixel();
    let len = stride * header.height as usize;
    if header.unpacked as usize != len {
        return Err(Error::CorruptData(format!(
            "GRD unpacked size {} does not match {}x{}",
            header.unpacked, header.width, header.height
        )));
    }

    let mut pixels = lzss::unpack(&data[HEADER_SIZE..], len, LzssConfig::DEFAULT)?;
    if header.is_bottom_up() {
        flip_rows(&mut pixels, stride);
    }
    ImageFrame::new(header.width, header.height, order, stride, pixels)
}
