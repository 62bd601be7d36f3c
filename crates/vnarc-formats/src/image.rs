//! Decoded image frames and signature detection

use crate::error::{Error, Result};

/// Largest accepted width or height
pub const MAX_DIMENSION: u32 = 0x8000;

/// Pixel layout of an [`ImageFrame`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelOrder {
    /// 24-bit blue, green, red
    Bgr,
    /// 32-bit blue, green, red, alpha
    Bgra,
    /// 8-bit grayscale
    Gray,
    /// 8-bit palette indices
    Indexed,
}

impl ChannelOrder {
    /// Bits per pixel of this layout
    pub const fn bits_per_pixel(self) -> u32 {
        match self {
            Self::Bgr => 24,
            Self::Bgra => 32,
            Self::Gray | Self::Indexed => 8,
        }
    }

    /// Bytes per pixel of this layout
    pub const fn bytes_per_pixel(self) -> usize {
        self.bits_per_pixel() as usize / 8
    }
}

/// Palette color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    /// Blue
    pub b: u8,
    /// Green
    pub g: u8,
    /// Red
    pub r: u8,
    /// Alpha
    pub a: u8,
}

impl Color {
    /// Opaque color from red, green and blue
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { b, g, r, a: 0xFF }
    }

    /// Color from a 4-byte BGRA quad
    pub const fn from_bgra(quad: [u8; 4]) -> Self {
        Self {
            b: quad[0],
            g: quad[1],
            r: quad[2],
            a: quad[3],
        }
    }
}

/// A decoded image, always stored top-down
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFrame {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Bits per pixel
    pub bpp: u32,
    /// Pixel layout
    pub channel_order: ChannelOrder,
    /// Bytes per row
    pub stride: usize,
    /// Row-major pixel data
    pub pixels: Vec<u8>,
    /// Palette of indexed images
    pub palette: Option<Vec<Color>>,
    /// Horizontal placement on the canvas
    pub offset_x: i32,
    /// Vertical placement on the canvas
    pub offset_y: i32,
}

impl ImageFrame {
    /// Build a frame after checking the buffer against the geometry
    pub fn new(
        width: u32,
        height: u32,
        channel_order: ChannelOrder,
        stride: usize,
        pixels: Vec<u8>,
    ) -> Result<Self> {
        check_dimensions(width, height)?;
        let row = width as usize * channel_order.bytes_per_pixel();
        if stride < row {
            return Err(Error::CorruptData(format!(
                "stride {stride} shorter than row of {row} bytes"
            )));
        }
        if pixels.len() != stride * height as usize {
            return Err(Error::CorruptData(format!(
                "pixel buffer holds {} bytes, expected {}",
                pixels.len(),
                stride * height as usize
            )));
        }
        Ok(Self {
            width,
            height,
            bpp: channel_order.bits_per_pixel(),
            channel_order,
            stride,
            pixels,
            palette: None,
            offset_x: 0,
            offset_y: 0,
        })
    }

    /// Build a frame whose rows carry no padding
    pub fn packed(
        width: u32,
        height: u32,
        channel_order: ChannelOrder,
        pixels: Vec<u8>,
    ) -> Result<Self> {
        let stride = width as usize * channel_order.bytes_per_pixel();
        Self::new(width, height, channel_order, stride, pixels)
    }

    /// Attach a palette
    #[must_use]
    pub fn with_palette(mut self, palette: Vec<Color>) -> Self {
        self.palette = Some(palette);
        self
    }

    /// Set the canvas placement
    #[must_use]
    pub fn with_offset(mut self, offset_x: i32, offset_y: i32) -> Self {
        self.offset_x = offset_x;
        self.offset_y = offset_y;
        self
    }

    /// Reverse the row order in place
    pub fn flip_vertical(&mut self) {
        flip_rows(&mut self.pixels, self.stride);
    }

    /// Bytes of row `y`
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.pixels[start..start + self.stride]
    }
}

/// Reverse the order of `stride`-byte rows in `pixels`
pub fn flip_rows(pixels: &mut [u8], stride: usize) {
    if stride == 0 {
        return;
    }
    let rows = pixels.len() / stride;
    for y in 0..rows / 2 {
        let (top, bottom) = pixels.split_at_mut((rows - 1 - y) * stride);
        top[y * stride..(y + 1) * stride].swap_with_slice(&mut bottom[..stride]);
    }
}

/// Interleave equally sized planes into packed pixels
///
/// `planes[0]` becomes the first byte of every pixel.
pub(crate) fn interleave_planes(planes: &[&[u8]]) -> Vec<u8> {
    let count = planes.iter().map(|p| p.len()).min().unwrap_or(0);
    let mut pixels = Vec::with_capacity(count * planes.len());
    for i in 0..count {
        pixels.extend(planes.iter().map(|p| p[i]));
    }
    pixels
}

/// Reject zero or oversized dimensions
pub fn check_dimensions(width: u32, height: u32) -> Result<()> {
    if width == 0 || width > MAX_DIMENSION {
        return Err(Error::unsupported("image width", width));
    }
    if height == 0 || height > MAX_DIMENSION {
        return Err(Error::unsupported("image height", height));
    }
    Ok(())
}

/// Image containers recognized by their leading bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    /// AZSys channel-planar bitmap
    Cpb,
    /// AZSys TYP1 bitmap
    Typ1,
    /// CatSystem2 HG-3
    Hg3,
    /// Circus CRXG
    Crx,
    /// Circus CRXD differential
    Crxd,
    /// Circus CPS
    Cps,
    /// Silky's GRD
    Grd,
    /// Silky's IGF
    Igf,
    /// Silky's AKB
    Akb,
    /// Silky's RMSK mask
    Rmsk,
    /// Softpal PGD (GE, 11_C or 00_C)
    Pgd,
    /// Softpal PIC
    Pic,
}

impl ImageFormat {
    /// Identify an image from its leading bytes
    pub fn detect(data: &[u8]) -> Option<Self> {
        let magic = data.get(..4)?;
        let format = match magic {
            b"CPB\x1A" => Self::Cpb,
            b"TYP1" => Self::Typ1,
            b"HG-3" => Self::Hg3,
            b"CRXG" => Self::Crx,
            b"CRXD" => Self::Crxd,
            b"CPS\0" => Self::Cps,
            b"GRD\0" => Self::Grd,
            b"IGF\0" => Self::Igf,
            b"AKB " | b"AKB+" => Self::Akb,
            b"RMSK" => Self::Rmsk,
            b"PIC\0" => Self::Pic,
            _ if data.get(0x1C..0x1E) == Some(&b"GE"[..])
                || matches!(data.get(0x18..0x1C), Some(b"11_C" | b"00_C")) =>
            {
                Self::Pgd
            }
            _ => return None,
        };
        Some(format)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_validates_buffer() {
        assert!(ImageFrame::new(2, 2, ChannelOrder::Bgr, 8, vec![0; 16]).is_ok());
        assert!(matches!(
            ImageFrame::new(2, 2, ChannelOrder::Bgr, 5, vec![0; 10]),
            Err(Error::CorruptData(_))
        ));
        assert!(matches!(
            ImageFrame::new(2, 2, ChannelOrder::Bgr, 6, vec![0; 11]),
            Err(Error::CorruptData(_))
        ));
        assert!(matches!(
            ImageFrame::new(0, 2, ChannelOrder::Gray, 0, vec![]),
            Err(Error::UnsupportedVariant { .. })
        ));
    }

    #[test]
    fn test_flip_vertical() {
        let mut frame = ImageFrame::packed(1, 3, ChannelOrder::Gray, vec![1, 2, 3]).unwrap();
        frame.flip_vertical();
        assert_eq!(frame.pixels, [3, 2, 1]);

        let mut frame = ImageFrame::packed(2, 2, ChannelOrder::Gray, vec![1, 2, 3, 4]).unwrap();
        frame.flip_vertical();
        assert_eq!(frame.pixels, [3, 4, 1, 2]);
        assert_eq!(frame.row(1), &[1, 2]);
    }

    #[test]
    fn test_interleave_planes() {
        let b = [1u8, 2];
        let g = [3u8, 4];
        let r = [5u8, 6];
        assert_eq!(interleave_planes(&[&b, &g, &r]), [1, 3, 5, 2, 4, 6]);
    }

    #[test]
    fn test_check_dimensions() {
        assert!(check_dimensions(1, 1).is_ok());
        assert!(check_dimensions(MAX_DIMENSION, MAX_DIMENSION).is_ok());
        assert!(check_dimensions(MAX_DIMENSION + 1, 1).is_err());
        assert!(check_dimensions(1, 0).is_err());
    }

    #[test]
    fn test_detect() {
        assert_eq!(ImageFormat::detect(b"CPB\x1A...."), Some(ImageFormat::Cpb));
        assert_eq!(ImageFormat::detect(b"AKB+...."), Some(ImageFormat::Akb));
        assert_eq!(ImageFormat::detect(b"abc"), None);

        let mut pgd = vec![0u8; 0x20];
        pgd[0x1C..0x1E].copy_from_slice(b"GE");
        assert_eq!(ImageFormat::detect(&pgd), Some(ImageFormat::Pgd));
        let mut pgd = vec![0u8; 0x20];
        pgd[0x18..0x1C].copy_from_slice(b"00_C");
        assert_eq!(ImageFormat::detect(&pgd), Some(ImageFormat::Pgd));
        assert_eq!(ImageFormat::detect(&[0u8; 0x20]), None);
    }
}
