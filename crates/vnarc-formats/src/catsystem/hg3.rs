//! HG-3 images
//!
//! A file header is followed by a chain of tagged chunks. `stdinfo` carries
//! the geometry and `img0000` the pixels as two zlib streams: a data stream
//! of non-zero bytes and a control stream of alternating copy and zero-fill
//! run lengths. The expanded buffer holds four bit planes that
//! [`apply_delta`] recombines into bottom-up pixels.
//!
//! Only the first frame of multi-frame files is decoded.

use binrw::BinRead;
use binrw::io::Cursor;
use tracing::trace;

use crate::bitstream::LsbBitStream;
use crate::codec::{alloc_output, zlib};
use crate::error::{Error, Result, header_mismatch};
use crate::image::{ChannelOrder, ImageFrame, check_dimensions, flip_rows};

/// Offset of the first tag
const FIRST_TAG: usize = 0x14;
/// Tag name plus next-offset and length words
const TAG_HEADER_SIZE: usize = 0x10;
/// Fields preceding the two zlib streams of `img0000`
const IMG_HEADER_SIZE: usize = 0x18;
/// Elias-gamma prefixes longer than this are corrupt
const MAX_GAMMA_BITS: u32 = 0x20;

/// HG-3 file header
#[derive(Debug, Clone, PartialEq, Eq, BinRead)]
#[br(little)]
pub struct Hg3Header {
    /// Signature, always `HG-3`
    #[br(assert(magic == *b"HG-3", "Invalid HG-3 magic: {:?}", magic))]
    pub magic: [u8; 4],
    /// Size of this header, 0xC
    pub header_size: u32,
    /// Format version, 0x300
    pub version: u32,
    /// Offset of the next frame, 0 for the last
    pub next_frame: u32,
    /// Frame number
    pub frame_id: u32,
}

/// `stdinfo` chunk
#[derive(Debug, Clone, PartialEq, Eq, BinRead)]
#[br(little)]
pub struct StdInfo {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// 24 or 32
    pub bpp: u32,
    /// Horizontal placement on the canvas
    pub offset_x: i32,
    /// Vertical placement on the canvas
    pub offset_y: i32,
    /// Canvas width
    pub canvas_width: u32,
    /// Canvas height
    pub canvas_height: u32,
}

struct Tag<'a> {
    name: &'a [u8],
    data: &'a [u8],
}

/// Walk the tag chain of the first frame
fn tags(data: &[u8]) -> Result<Vec<Tag<'_>>> {
    let mut tags = Vec::new();
    let mut pos = FIRST_TAG;
    loop {
        let header = data
            .get(pos..pos + TAG_HEADER_SIZE)
            .ok_or_else(|| Error::CorruptData(format!("HG-3 tag at {pos:#x} truncated")))?;
        let next = u32::from_le_bytes([header[8], header[9], header[10], header[11]]) as usize;
        let len = u32::from_le_bytes([header[12], header[13], header[14], header[15]]) as usize;
        let start = pos + TAG_HEADER_SIZE;
        let body = start
            .checked_add(len)
            .and_then(|end| data.get(start..end))
            .ok_or_else(|| Error::CorruptData(format!("HG-3 tag at {pos:#x} overruns the file")))?;
        let name = crate::util::fixed_cstring(&header[..8]);
        trace!("HG-3 tag {:?} ({} bytes)", String::from_utf8_lossy(name), len);
        tags.push(Tag { name, data: body });
        if next == 0 {
            return Ok(tags);
        }
        pos = pos
            .checked_add(next)
            .filter(|_| next >= TAG_HEADER_SIZE)
            .ok_or_else(|| Error::CorruptData("HG-3 tag chain loops".into()))?;
    }
}

fn read_gamma(bits: &mut LsbBitStream<'_>) -> Option<u32> {
    let mut zeros = 0;
    while !bits.get_next_bit()? {
        zeros += 1;
        if zeros >= MAX_GAMMA_BITS {
            return None;
        }
    }
    let mut value = 1u32;
    for _ in 0..zeros {
        value = (value << 1) | bits.get_bits(1)?;
    }
    Some(value)
}

/// Expand the zero-run coding of the data stream
fn expand_runs(data: &[u8], ctl: &[u8]) -> Result<Vec<u8>> {
    let corrupt = || Error::CorruptData("HG-3 control stream exhausted".into());
    let mut bits = LsbBitStream::new(ctl);
    let mut copy = bits.get_next_bit().ok_or_else(corrupt)?;
    let len = read_gamma(&mut bits).ok_or_else(corrupt)? as usize;
    let mut out = alloc_output(len)?;

    let mut src = 0;
    let mut dst = 0;
    while dst < len {
        let count = (read_gamma(&mut bits).ok_or_else(corrupt)? as usize).min(len - dst);
        if copy {
            let run = data
                .get(src..src + count)
                .ok_or_else(|| Error::CorruptData("HG-3 data stream exhausted".into()))?;
            out[dst..dst + count].copy_from_slice(run);
            src += count;
        }
        dst += count;
        copy = !copy;
    }
    Ok(out)
}

/// `val` with each two-bit group spread into the low bits of its own byte
const fn spread(i: usize) -> u32 {
    let i = i as u32;
    ((i >> 6) & 3) << 24 | ((i >> 4) & 3) << 16 | ((i >> 2) & 3) << 8 | (i & 3)
}

const fn weight_tables() -> [[u32; 256]; 4] {
    let mut tables = [[0u32; 256]; 4];
    let mut i = 0;
    while i < 256 {
        let val = spread(i);
        tables[0][i] = val << 6;
        tables[1][i] = val << 4;
        tables[2][i] = val << 2;
        tables[3][i] = val;
        i += 1;
    }
    tables
}

static WEIGHTS: [[u32; 256]; 4] = weight_tables();

/// Undo the sign fold: odd values were negative
const fn unfold(v: u8) -> u8 {
    if v & 1 != 0 { (v >> 1) ^ 0xFF } else { v >> 1 }
}

/// Recombine the four bit planes of `data` and undo the pixel prediction
///
/// The result is bottom-up with rows of `width * pixel_size` bytes.
pub fn apply_delta(data: &[u8], width: u32, height: u32, pixel_size: usize) -> Result<Vec<u8>> {
    let stride = width as usize * pixel_size;
    if data.len() % 4 != 0 || data.len() != stride * height as usize {
        return Err(Error::CorruptData(format!(
            "HG-3 plane data of {} bytes does not fit {width}x{height}",
            data.len()
        )));
    }

    let plane_len = data.len() / 4;
    let (p0, rest) = data.split_at(plane_len);
    let (p1, rest) = rest.split_at(plane_len);
    let (p2, p3) = rest.split_at(plane_len);

    let mut out = Vec::with_capacity(data.len());
    for i in 0..plane_len {
        let val = WEIGHTS[0][p0[i] as usize]
            | WEIGHTS[1][p1[i] as usize]
            | WEIGHTS[2][p2[i] as usize]
            | WEIGHTS[3][p3[i] as usize];
        out.extend(val.to_le_bytes().map(unfold));
    }

    for x in pixel_size..stride {
        out[x] = out[x].wrapping_add(out[x - pixel_size]);
    }
    for pos in stride..out.len() {
        out[pos] = out[pos].wrapping_add(out[pos - stride]);
    }
    Ok(out)
}

fn field(data: &[u8], index: usize) -> Result<usize> {
    data.get(index * 4..index * 4 + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as usize)
        .ok_or_else(|| Error::CorruptData("HG-3 img0000 header truncated".into()))
}

/// Decode an HG-3 image
pub fn decode(data: &[u8]) -> Result<ImageFrame> {
    let header = Hg3Header::read(&mut Cursor::new(data)).map_err(header_mismatch)?;
    trace!("HG-3 version {:#x}", header.version);
    let tags = tags(data)?;

    let info_tag = tags
        .iter()
        .find(|t| t.name == b"stdinfo")
        .ok_or_else(|| Error::CorruptData("HG-3 without stdinfo".into()))?;
    let info = StdInfo::read(&mut Cursor::new(info_tag.data))
        .map_err(|_| Error::CorruptData("HG-3 stdinfo truncated".into()))?;
    check_dimensions(info.width, info.height)?;
    let order = match info.bpp {
        24 => ChannelOrder::Bgr,
        32 => ChannelOrder::Bgra,
        bpp => return Err(Error::unsupported("HG-3 bit depth", bpp)),
    };

    let img = tags
        .iter()
        .find(|t| t.name.starts_with(b"img") && t.name.len() == 7)
        .ok_or_else(|| Error::CorruptData("HG-3 without image chunk".into()))?
        .data;
    let data_packed = field(img, 2)?;
    let data_len = field(img, 3)?;
    let ctl_packed = field(img, 4)?;
    let ctl_len = field(img, 5)?;
    let streams = &img[IMG_HEADER_SIZE.min(img.len())..];
    let (packed_data, rest) = streams
        .split_at_checked(data_packed)
        .ok_or_else(|| Error::CorruptData("HG-3 data stream truncated".into()))?;
    let packed_ctl = rest
        .get(..ctl_packed)
        .ok_or_else(|| Error::CorruptData("HG-3 control stream truncated".into()))?;

    let planes = zlib::inflate_exact(packed_data, data_len)?;
    let ctl = zlib::inflate_exact(packed_ctl, ctl_len)?;
    let expanded = expand_runs(&planes, &ctl)?;

    let pixel_size = order.bytes_per_pixel();
    let mut pixels = apply_delta(&expanded, info.width, info.height, pixel_size)?;
    flip_rows(&mut pixels, info.width as usize * pixel_size);
    Ok(ImageFrame::packed(info.width, info.height, order, pixels)?
        .with_offset(info.offset_x, info.offset_y))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::codec::zlib::deflate;

    #[derive(Default)]
    struct BitWriter {
        bytes: Vec<u8>,
        used: u32,
    }

    impl BitWriter {
        fn bit(&mut self, set: bool) {
            if self.used % 8 == 0 {
                self.bytes.push(0);
            }
            if set {
                *self.bytes.last_mut().unwrap() |= 1 << (self.used % 8);
            }
            self.used += 1;
        }

        fn gamma(&mut self, value: u32) {
            let width = 32 - value.leading_zeros();
            for _ in 1..width {
                self.bit(false);
            }
            for i in (0..width).rev() {
                self.bit(value >> i & 1 != 0);
            }
        }
    }

    fn tag(name: &[u8; 8], body: &[u8], last: bool) -> Vec<u8> {
        let mut out = name.to_vec();
        let next = if last { 0 } else { (TAG_HEADER_SIZE + body.len()) as u32 };
        out.extend_from_slice(&next.to_le_bytes());
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend_from_slice(body);
        out
    }

    fn build(width: u32, height: u32, bpp: u32, planes: &[u8], ctl: &[u8]) -> Vec<u8> {
        let mut info = Vec::new();
        for v in [width, height, bpp, 3, 5, width, height] {
            info.extend_from_slice(&v.to_le_bytes());
        }
        let packed_data = deflate(planes);
        let packed_ctl = deflate(ctl);
        let mut img = Vec::new();
        for v in [
            0,
            height,
            packed_data.len() as u32,
            planes.len() as u32,
            packed_ctl.len() as u32,
            ctl.len() as u32,
        ] {
            img.extend_from_slice(&v.to_le_bytes());
        }
        img.extend(packed_data);
        img.extend(packed_ctl);

        let mut out = b"HG-3".to_vec();
        for v in [0xCu32, 0x300, 0, 0] {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out.extend(tag(b"stdinfo\0", &info, false));
        out.extend(tag(b"img0000\0", &img, true));
        out
    }

    #[test]
    fn test_weight_tables() {
        assert_eq!(WEIGHTS[0][0x40], 0x4000_0000);
        assert_eq!(WEIGHTS[3][0xFF], 0x0303_0303);
        assert_eq!(WEIGHTS[1][0x01], 0x10);
    }

    #[test]
    fn test_apply_delta_single_pixel() {
        assert_eq!(apply_delta(&[0x40, 0, 0, 0], 1, 1, 4).unwrap(), [0, 0, 0, 0x20]);
    }

    #[test]
    fn test_apply_delta_horizontal_sum() {
        let out = apply_delta(&[0, 0, 0, 0, 0, 0, 2, 2], 2, 1, 4).unwrap();
        assert_eq!(out, [1, 0, 0, 0, 2, 0, 0, 0]);
    }

    #[test]
    fn test_apply_delta_negative_and_vertical() {
        // One 32-bit pixel per row; 3 folds to -2
        let out = apply_delta(&[0, 0, 0, 0, 0, 0, 2, 3], 1, 2, 4).unwrap();
        assert_eq!(out, [1, 0, 0, 0, 0xFF, 0, 0, 0]);
    }

    #[test]
    fn test_apply_delta_rejects_size() {
        assert!(apply_delta(&[0; 8], 3, 1, 4).is_err());
        assert!(apply_delta(&[0; 6], 2, 1, 3).is_err());
    }

    #[test]
    fn test_gamma() {
        let mut writer = BitWriter::default();
        for v in [1, 2, 8, 300] {
            writer.gamma(v);
        }
        let mut bits = LsbBitStream::new(&writer.bytes);
        for v in [1, 2, 8, 300] {
            assert_eq!(read_gamma(&mut bits), Some(v));
        }
    }

    #[test]
    fn test_decode_copy_run() {
        let mut ctl = BitWriter::default();
        ctl.bit(true);
        ctl.gamma(8);
        ctl.gamma(8);
        assert_eq!(ctl.bytes, [0x11, 0x08]);

        let data = build(2, 1, 32, &[0, 0, 0, 0, 0, 0, 2, 2], &ctl.bytes);
        let frame = decode(&data).unwrap();
        assert_eq!((frame.width, frame.height), (2, 1));
        assert_eq!(frame.channel_order, ChannelOrder::Bgra);
        assert_eq!(frame.pixels, [1, 0, 0, 0, 2, 0, 0, 0]);
        assert_eq!((frame.offset_x, frame.offset_y), (3, 5));
    }

    #[test]
    fn test_decode_zero_run_and_flip() {
        // 2 px of 24 bpp, two rows; only plane 3 carries data
        let mut ctl = BitWriter::default();
        ctl.bit(false);
        ctl.gamma(12);
        ctl.gamma(10);
        ctl.gamma(2);
        let data = build(2, 2, 24, &[0x20, 0], &ctl.bytes);
        let frame = decode(&data).unwrap();
        assert_eq!(frame.channel_order, ChannelOrder::Bgr);
        assert_eq!(frame.stride, 6);
        assert_eq!(frame.pixels, [1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_control_overrun() {
        let mut ctl = BitWriter::default();
        ctl.bit(true);
        ctl.gamma(8);
        ctl.gamma(8);
        let data = build(2, 1, 32, &[0, 0, 0], &ctl.bytes);
        assert!(decode(&data).is_err());
    }

    #[test]
    fn test_bad_depth() {
        let mut ctl = BitWriter::default();
        ctl.bit(false);
        ctl.gamma(2);
        ctl.gamma(2);
        let data = build(1, 1, 16, &[], &ctl.bytes);
        assert!(matches!(
            decode(&data),
            Err(Error::UnsupportedVariant { .. })
        ));
    }

    #[test]
    fn test_not_hg3() {
        assert!(decode(b"HG-2\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0").unwrap_err().is_mismatch());
    }
}
