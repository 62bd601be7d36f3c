//! PGD images
//!
//! Three flavors share the leading placement header
//! `offset_x, offset_y, width, height, canvas_w, canvas_h`:
//!
//! - `PGD/GE`: `GE` at 0x1C, then `method, unknown, unpacked, packed` and
//!   a [`unpack_ge`](crate::codec::pgd::unpack_ge) stream at 0x2C
//! - `PGD/11_C`: tag at 0x18, `unpacked, packed`, then a windowed stream
//!   holding a TGA image
//! - `PGD/00_C`: as `11_C` with a smaller window and raw BGRA rows

use binrw::BinRead;
use binrw::io::Cursor;
use tracing::trace;

use crate::codec::pgd::{LOOK_BEHIND_00C, LOOK_BEHIND_11C, unpack_ge, unpack_window};
use crate::error::{Error, Result, header_mismatch};
use crate::image::{ChannelOrder, ImageFrame, check_dimensions, flip_rows, interleave_planes};

const GE_DATA: usize = 0x2C;
const WINDOW_DATA: usize = 0x24;
const TGA_HEADER_SIZE: usize = 18;

/// Placement header shared by every flavor
#[derive(Debug, Clone, PartialEq, Eq, BinRead)]
#[br(little)]
pub struct PgdHeader {
    /// Horizontal placement
    pub offset_x: i32,
    /// Vertical placement
    pub offset_y: i32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Width of the screen the image is placed on
    pub canvas_width: u32,
    /// Height of the screen the image is placed on
    pub canvas_height: u32,
}

/// Compression header of a `PGD/GE` image, at 0x20
#[derive(Debug, Clone, PartialEq, Eq, BinRead)]
#[br(little)]
pub struct GeHeader {
    /// 1 planar BGRA, 2 YUV 4:2:0, 3 row prediction
    pub method: u16,
    /// Unused
    pub unknown: u16,
    /// Bytes after unpacking
    pub unpacked: u32,
    /// Stored bytes
    pub packed: u32,
}

/// Decode any PGD flavor
pub fn decode(data: &[u8]) -> Result<ImageFrame> {
    if data.get(0x1C..0x1E) == Some(&b"GE"[..]) {
        return decode_ge(data);
    }
    match data.get(0x18..0x1C) {
        Some(b"11_C") => decode_window(data, Payload::Tga),
        Some(b"00_C") => decode_window(data, Payload::RawBgra),
        _ => Err(Error::mismatch("not a PGD image")),
    }
}

fn read_header(data: &[u8]) -> Result<PgdHeader> {
    let header = PgdHeader::read(&mut Cursor::new(data)).map_err(header_mismatch)?;
    check_dimensions(header.width, header.height)?;
    Ok(header)
}

fn stream(data: &[u8], start: usize, packed: u32) -> Result<&[u8]> {
    data.get(start..start + packed as usize)
        .ok_or_else(|| Error::CorruptData(format!("PGD stream of {packed} bytes truncated")))
}

fn decode_ge(data: &[u8]) -> Result<ImageFrame> {
    let header = read_header(data)?;
    let ge = GeHeader::read(&mut Cursor::new(data.get(0x20..).unwrap_or_default()))
        .map_err(header_mismatch)?;
    trace!("PGD/GE method {} {}x{}", ge.method, header.width, header.height);
    let unpacked = unpack_ge(stream(data, GE_DATA, ge.packed)?, ge.unpacked as usize)?;
    let (width, height) = (header.width as usize, header.height as usize);

    let frame = match ge.method {
        1 => {
            let plane = width * height;
            expect_len(&unpacked, plane * 4)?;
            let planes: Vec<&[u8]> = unpacked.chunks_exact(plane).collect();
            let pixels = interleave_planes(&planes);
            ImageFrame::packed(header.width, header.height, ChannelOrder::Bgra, pixels)?
        }
        2 => {
            let pixels = yuv_to_bgr(&unpacked, width, height)?;
            ImageFrame::packed(header.width, header.height, ChannelOrder::Bgr, pixels)?
        }
        3 => decode_predicted(&unpacked, header.width, header.height)?,
        method => return Err(Error::unsupported("PGD/GE method", method)),
    };
    Ok(frame.with_offset(header.offset_x, header.offset_y))
}

fn expect_len(data: &[u8], len: usize) -> Result<()> {
    if data.len() == len {
        Ok(())
    } else {
        Err(Error::CorruptData(format!(
            "PGD payload holds {} bytes, expected {len}",
            data.len()
        )))
    }
}

/// Convert U, V and Y planes with half-resolution chroma to BGR
fn yuv_to_bgr(data: &[u8], width: usize, height: usize) -> Result<Vec<u8>> {
    let chroma_width = width.div_ceil(2);
    let chroma = chroma_width * height.div_ceil(2);
    expect_len(data, chroma * 2 + width * height)?;
    let (u_plane, rest) = data.split_at(chroma);
    let (v_plane, y_plane) = rest.split_at(chroma);

    let mut pixels = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        for x in 0..width {
            let c = (y / 2) * chroma_width + x / 2;
            let u = i32::from(u_plane[c] as i8);
            let v = i32::from(v_plane[c] as i8);
            let luma = i32::from(y_plane[y * width + x]);
            let b = luma + ((226 * u) >> 7);
            let g = luma + (-(43 * u + 89 * v) >> 7);
            let r = luma + ((179 * v) >> 7);
            pixels.extend([b, g, r].map(|c| c.clamp(0, 255) as u8));
        }
    }
    Ok(pixels)
}

/// Undo per-row prediction
///
/// The payload starts with `reserved u16, bpp u16, width u16, height u16`,
/// then one mode byte per row, then the residuals.
fn decode_predicted(data: &[u8], width: u32, height: u32) -> Result<ImageFrame> {
    let field = |i: usize| data.get(i..i + 2).map(|b| u16::from_le_bytes([b[0], b[1]]));
    let (Some(bpp), Some(w), Some(h)) = (field(2), field(4), field(6)) else {
        return Err(Error::CorruptData("PGD/GE prediction header truncated".into()));
    };
    if (u32::from(w), u32::from(h)) != (width, height) {
        return Err(Error::CorruptData(format!(
            "PGD/GE payload is {w}x{h}, header says {width}x{height}"
        )));
    }
    let order = match bpp {
        24 => ChannelOrder::Bgr,
        32 => ChannelOrder::Bgra,
        bpp => return Err(Error::unsupported("PGD/GE depth", bpp)),
    };
    let ps = order.bytes_per_pixel();
    let stride = width as usize * ps;
    let rows = height as usize;
    expect_len(data, 8 + rows + stride * rows)?;
    let (modes, residuals) = data[8..].split_at(rows);

    let mut pixels = vec![0u8; stride * rows];
    for (y, &mode) in modes.iter().enumerate() {
        let (done, current) = pixels.split_at_mut(y * stride);
        let above = if y == 0 {
            None
        } else {
            Some(&done[(y - 1) * stride..])
        };
        let row = &mut current[..stride];
        let src = &residuals[y * stride..(y + 1) * stride];
        let up = |i: usize| above.map_or(0, |a| a[i]);
        for i in 0..stride {
            let predicted = match mode {
                1 if i < ps => 0,
                1 => row[i - ps],
                2 => up(i),
                4 if i < ps => up(i),
                4 => ((u16::from(row[i - ps]) + u16::from(up(i))) / 2) as u8,
                mode => return Err(Error::unsupported("PGD/GE row mode", mode)),
            };
            row[i] = predicted.wrapping_sub(src[i]);
        }
    }
    ImageFrame::new(width, height, order, stride, pixels)
}

/// What a windowed stream expands to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Payload {
    /// `11_C`: a complete TGA file
    Tga,
    /// `00_C`: top-down BGRA rows
    RawBgra,
}

impl Payload {
    const fn look_behind(self) -> usize {
        match self {
            Self::Tga => LOOK_BEHIND_11C,
            Self::RawBgra => LOOK_BEHIND_00C,
        }
    }
}

fn decode_window(data: &[u8], kind: Payload) -> Result<ImageFrame> {
    let header = read_header(data)?;
    let sizes = data
        .get(0x1C..WINDOW_DATA)
        .ok_or_else(|| Error::CorruptData("PGD size fields truncated".into()))?;
    let unpacked = u32::from_le_bytes([sizes[0], sizes[1], sizes[2], sizes[3]]);
    let packed = u32::from_le_bytes([sizes[4], sizes[5], sizes[6], sizes[7]]);
    let payload = unpack_window(
        stream(data, WINDOW_DATA, packed)?,
        unpacked as usize,
        kind.look_behind(),
    )?;

    let frame = match kind {
        Payload::Tga => decode_tga(&payload)?,
        Payload::RawBgra => {
            expect_len(&payload, header.width as usize * header.height as usize * 4)?;
            ImageFrame::packed(header.width, header.height, ChannelOrder::Bgra, payload)?
        }
    };
    Ok(frame.with_offset(header.offset_x, header.offset_y))
}

/// Uncompressed true-color TGA
fn decode_tga(data: &[u8]) -> Result<ImageFrame> {
    let header = data
        .get(..TGA_HEADER_SIZE)
        .ok_or_else(|| Error::CorruptData("TGA header truncated".into()))?;
    if header[1] != 0 || header[2] != 2 {
        return Err(Error::unsupported("TGA image type", header[2]));
    }
    let width = u32::from(u16::from_le_bytes([header[12], header[13]]));
    let height = u32::from(u16::from_le_bytes([header[14], header[15]]));
    check_dimensions(width, height)?;
    let order = match header[16] {
        24 => ChannelOrder::Bgr,
        32 => ChannelOrder::Bgra,
        bpp => return Err(Error::unsupported("TGA depth", bpp)),
    };
    let top_down = header[17] & 0x20 != 0;

    let stride = width as usize * order.bytes_per_pixel();
    let start = TGA_HEADER_SIZE + usize::from(header[0]);
    let mut pixels = data
        .get(start..start + stride * height as usize)
        .ok_or_else(|| Error::CorruptData("TGA pixels truncated".into()))?
        .to_vec();
    if !top_down {
        flip_rows(&mut pixels, stride);
    }
    ImageFrame::new(width, height, order, stride, pixels)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Control-stream literal runs covering `data`
    fn literal_runs(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        for group in data.chunks(255 * 8) {
            out.push(0);
            for run in group.chunks(255) {
                out.push(run.len() as u8);
                out.extend_from_slice(run);
            }
        }
        out
    }

    fn placement(width: u32, height: u32) -> Vec<u8> {
        let mut out = Vec::new();
        for v in [3u32, 5, width, height, 800, 600] {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }

    fn build_ge(width: u32, height: u32, method: u16, payload: &[u8]) -> Vec<u8> {
        let packed = literal_runs(payload);
        let mut out = placement(width, height);
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(b"GE\0\0");
        out.extend_from_slice(&method.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&(packed.len() as u32).to_le_bytes());
        out.extend(packed);
        out
    }

    fn build_window(tag: &[u8; 4], width: u32, height: u32, payload: &[u8]) -> Vec<u8> {
        let packed = literal_runs(payload);
        let mut out = placement(width, height);
        out.extend_from_slice(tag);
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&(packed.len() as u32).to_le_bytes());
        out.extend(packed);
        out
    }

    #[test]
    fn test_ge_planar() {
        // two pixels, planes B G R A
        let payload = [1, 2, 3, 4, 5, 6, 7, 8];
        let frame = decode(&build_ge(2, 1, 1, &payload)).unwrap();
        assert_eq!(frame.channel_order, ChannelOrder::Bgra);
        assert_eq!(frame.pixels, [1, 3, 5, 7, 2, 4, 6, 8]);
        assert_eq!((frame.offset_x, frame.offset_y), (3, 5));
    }

    #[test]
    fn test_ge_yuv() {
        // 2x2 with one chroma sample: u = 10, v = 0
        let payload = [10, 0, 100, 100, 100, 100];
        let frame = decode(&build_ge(2, 2, 2, &payload)).unwrap();
        assert_eq!(frame.channel_order, ChannelOrder::Bgr);
        assert_eq!(&frame.pixels[..3], [117, 96, 100]);
        assert!(frame.pixels.chunks(3).all(|p| p == [117, 96, 100]));
    }

    #[test]
    fn test_ge_yuv_clamps() {
        let payload = [0x7F, 0x7F, 250];
        let frame = decode(&build_ge(1, 1, 2, &payload)).unwrap();
        // b = 250 + 224, g = 250 - 131, r = 250 + 177
        assert_eq!(frame.pixels, [255, 119, 255]);
    }

    #[test]
    fn test_ge_prediction() {
        let mut payload = vec![0, 0, 24, 0, 2, 0, 2, 0];
        payload.extend([1, 2]);
        payload.extend([10, 20, 30, 1, 2, 3]);
        payload.extend([1, 1, 1, 1, 1, 1]);
        let frame = decode(&build_ge(2, 2, 3, &payload)).unwrap();
        assert_eq!(
            frame.pixels,
            [246, 236, 226, 245, 234, 223, 245, 235, 225, 244, 233, 222]
        );
    }

    #[test]
    fn test_ge_average_mode() {
        // 1x2 at 24 bpp: row 0 up from zero, row 1 first pixel from above
        let mut payload = vec![0, 0, 24, 0, 1, 0, 2, 0];
        payload.extend([2, 4]);
        payload.extend([0xF6, 0xEC, 0xE2]);
        payload.extend([1, 2, 3]);
        let frame = decode(&build_ge(1, 2, 3, &payload)).unwrap();
        assert_eq!(frame.pixels, [10, 20, 30, 9, 18, 27]);
    }

    #[test]
    fn test_ge_rejects_method() {
        let data = build_ge(1, 1, 9, &[0; 4]);
        assert!(matches!(decode(&data), Err(Error::UnsupportedVariant { .. })));
    }

    #[test]
    fn test_11c_tga_bottom_up() {
        let mut tga = vec![0u8; TGA_HEADER_SIZE];
        tga[2] = 2;
        tga[12] = 1;
        tga[14] = 2;
        tga[16] = 32;
        tga.extend([1, 1, 1, 1, 2, 2, 2, 2]);
        let frame = decode(&build_window(b"11_C", 1, 2, &tga)).unwrap();
        assert_eq!(frame.pixels, [2, 2, 2, 2, 1, 1, 1, 1]);
        assert_eq!(frame.offset_x, 3);
    }

    #[test]
    fn test_00c_raw_rows() {
        let payload = [9, 8, 7, 6];
        let frame = decode(&build_window(b"00_C", 1, 1, &payload)).unwrap();
        assert_eq!(frame.channel_order, ChannelOrder::Bgra);
        assert_eq!(frame.pixels, payload);
    }

    #[test]
    fn test_00c_wrong_size() {
        let data = build_window(b"00_C", 2, 1, &[0; 4]);
        assert!(matches!(decode(&data), Err(Error::CorruptData(_))));
    }
}
