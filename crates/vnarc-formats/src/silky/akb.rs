//! AKB images
//!
//! An AKB holds a cropped rectangle of delta-coded pixels over a
//! solid background color. `AKB+` carries eight more header bytes.

use binrw::BinRead;
use binrw::io::Cursor;
use tracing::trace;

use crate::codec::lzss::{self, LzssConfig};
use crate::error::{Error, Result, header_mismatch};
use crate::image::{ChannelOrder, ImageFrame, check_dimensions, flip_rows};

const FLAG_24BPP: u32 = 0x4000_0000;

/// AKB header
#[derive(Debug, Clone, PartialEq, Eq, BinRead)]
#[br(little)]
pub struct AkbHeader {
    /// `AKB ` or `AKB+`
    #[br(assert(&magic == b"AKB " || &magic == b"AKB+", "Invalid AKB magic: {:?}", magic))]
    pub magic: [u8; 4],
    /// Canvas width
    pub width: u16,
    /// Canvas height
    pub height: u16,
    /// Bit 30 selects 24 bpp
    pub flags: u32,
    /// Canvas fill, BGRA
    pub background: [u8; 4],
    /// Crop rectangle, left edge
    pub crop_left: i32,
    /// Crop rectangle, top edge
    pub crop_top: i32,
    /// Crop rectangle, right edge (exclusive)
    pub crop_right: i32,
    /// Crop rectangle, bottom edge (exclusive)
    pub crop_bottom: i32,
}

impl AkbHeader {
    /// Bytes before the pixel stream
    pub fn size(&self) -> usize {
        if &self.magic == b"AKB+" { 0x28 } else { 0x20 }
    }

    /// Canvas pixel layout
    pub const fn channel_order(&self) -> ChannelOrder {
        if self.flags & FLAG_24BPP != 0 {
            ChannelOrder::Bgr
        } else {
            ChannelOrder::Bgra
        }
    }

    fn crop(&self) -> Result<(usize, usize, usize, usize)> {
        let (w, h) = (i32::from(self.width), i32::from(self.height));
        let valid = 0 <= self.crop_left
            && self.crop_left <= self.crop_right
            && self.crop_right <= w
            && 0 <= self.crop_top
            && self.crop_top <= self.crop_bottom
            && self.crop_bottom <= h;
        if !valid {
            return Err(Error::CorruptData(format!(
                "AKB crop ({}, {})-({}, {}) outside {}x{}",
                self.crop_left, self.crop_top, self.crop_right, self.crop_bottom, w, h
            )));
        }
        Ok((
            self.crop_left as usize,
            self.crop_top as usize,
            (self.crop_right - self.crop_left) as usize,
            (self.crop_bottom - self.crop_top) as usize,
        ))
    }
}

/// Undo the horizontal delta of the first row, then the vertical delta of
/// every later row
pub fn restore_delta(pixels: &mut [u8], stride: usize, pixel_size: usize) {
    if stride == 0 {
        return;
    }
    for x in pixel_size..stride.min(pixels.len()) {
        pixels[x] = pixels[x].wrapping_add(pixels[x - pixel_size]);
    }
    for i in stride..pixels.len() {
        pixels[i] = pixels[i].wrapping_add(pixels[i - stride]);
    }
}

/// Decode an AKB image onto its full canvas
pub fn decode(data: &[u8]) -> Result<ImageFrame> {
    let header = AkbHeader::read(&mut Cursor::new(data)).map_err(header_mismatch)?;
    let (width, height) = (u32::from(header.width), u32::from(header.height));
    check_dimensions(width, height)?;
    let order = header.channel_order();
    let pixel_size = order.bytes_per_pixel();
    let (left, top, crop_w, crop_h) = header.crop()?;
    trace!("AKB {}x{} crop {}x{} at ({}, {})", width, height, crop_w, crop_h, left, top);

    let stride = width as usize * pixel_size;
    let mut canvas: Vec<u8> = header.background[..pixel_size]
        .iter()
        .copied()
        .cycle()
        .take(stride * height as usize)
        .collect();
    if crop_w == 0 || crop_h == 0 {
        return ImageFrame::new(width, height, order, stride, canvas);
    }

    let body = data
        .get(header.size()..)
        .ok_or_else(|| Error::CorruptData("AKB header truncated".into()))?;
    let crop_stride = crop_w * pixel_size;
    let mut pixels = lzss::unpack(body, crop_stride * crop_h, LzssConfig::DEFAULT)?;
    restore_delta(&mut pixels, crop_stride, pixel_size);
    flip_rows(&mut pixels, crop_stride);

    for (y, row) in pixels.chunks_exact(crop_stride).enumerate() {
        let start = (top + y) * stride + left * pixel_size;
        canvas[start..start + crop_stride].copy_from_slice(row);
    }
    ImageFrame::new(width, height, order, stride, canvas)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::codec::lzss::pack_literals;
    use pretty_assertions::assert_eq;

    fn build(magic: &[u8; 4], size: (u16, u16), flags: u32, crop: [i32; 4], stored: &[u8]) -> Vec<u8> {
        let mut out = magic.to_vec();
        out.extend_from_slice(&size.0.to_le_bytes());
        out.extend_from_slice(&size.1.to_le_bytes());
        out.extend_from_slice(&flags.to_le_bytes());
        out.extend_from_slice(&[0x11, 0x22, 0x33, 0x44]);
        for v in crop {
            out.extend_from_slice(&v.to_le_bytes());
        }
        if magic == b"AKB+" {
            out.extend_from_slice(&[0; 8]);
        }
        out.extend(pack_literals(stored, false));
        out
    }

    #[test]
    fn test_restore_delta_order() {
        // 2x2 gray: first row horizontal, second row vertical
        let mut pixels = [1, 1, 2, 3];
        restore_delta(&mut pixels, 2, 1);
        assert_eq!(pixels, [1, 2, 3, 5]);
    }

    #[test]
    fn test_crop_composited_on_background() {
        // 3x2 canvas at 24 bpp, 1x2 crop at column 1; stored bottom row first
        let stored = [1, 2, 3, 4, 4, 4];
        let data = build(b"AKB+", (3, 2), FLAG_24BPP, [1, 0, 2, 2], &stored);
        let frame = decode(&data).unwrap();
        assert_eq!(frame.channel_order, ChannelOrder::Bgr);
        let bg = [0x11, 0x22, 0x33];
        let mut expected = Vec::new();
        expected.extend(bg);
        expected.extend([5, 6, 7]);
        expected.extend(bg);
        expected.extend(bg);
        expected.extend([1, 2, 3]);
        expected.extend(bg);
        assert_eq!(frame.pixels, expected);
    }

    #[test]
    fn test_empty_crop_is_background() {
        let data = build(b"AKB ", (2, 1), 0, [0, 0, 0, 0], &[]);
        let frame = decode(&data).unwrap();
        assert_eq!(frame.channel_order, ChannelOrder::Bgra);
        assert_eq!(frame.pixels, [0x11, 0x22, 0x33, 0x44, 0x11, 0x22, 0x33, 0x44]);
    }

    #[test]
    fn test_crop_outside_canvas() {
        let data = build(b"AKB ", (2, 2), 0, [0, 0, 3, 1], &[]);
        assert!(matches!(decode(&data), Err(Error::CorruptData(_))));
    }
}
