//! `CRXG` images
//!
//! Compression 1 is the windowed RLE of [`codec::crx`] over 4-aligned rows.
//! Compressions 2 and 3 are zlib streams where each row starts with a filter
//! byte; 32-bit pixels come out as `(a, b, g, r)` with inverted alpha.

use binrw::BinRead;
use binrw::io::Cursor;
use tracing::trace;

use crate::codec::{self, CodecError, Input, zlib};
use crate::error::{Error, Result, header_mismatch};
use crate::image::{ChannelOrder, Color, ImageFrame, check_dimensions};

/// Size of the fixed header
pub const HEADER_SIZE: usize = 0x14;
const PALETTE_SIZE: usize = 0x100 * 3;
/// Packed length precedes the zlib stream
const FLAG_LENGTH_PREFIX: u16 = 0x10;
/// Size of each record of the compression 3 prefix table
const EXTRA_RECORD_SIZE: usize = 0x10;

/// CRXG header
#[derive(Debug, Clone, PartialEq, Eq, BinRead)]
#[br(little)]
pub struct CrxHeader {
    /// Signature, always `CRXG`
    #[br(assert(magic == *b"CRXG", "Invalid CRX magic: {:?}", magic))]
    pub magic: [u8; 4],
    /// Horizontal placement
    pub offset_x: i16,
    /// Vertical placement
    pub offset_y: i16,
    /// Width in pixels
    pub width: u16,
    /// Height in pixels
    pub height: u16,
    /// 1 windowed RLE, 2 or 3 zlib with row filters
    pub compression: u16,
    /// Storage flags
    pub flags: u16,
    /// 0 for 24 bpp, 1 for 32 bpp, 0x100 for 8 bpp
    pub depth: u16,
    /// Engine blend mode
    pub mode: u16,
}

impl CrxHeader {
    fn channel_order(&self) -> Result<ChannelOrder> {
        match self.depth {
            0 => Ok(ChannelOrder::Bgr),
            1 => Ok(ChannelOrder::Bgra),
            0x100 => Ok(ChannelOrder::Indexed),
            depth => Err(Error::unsupported("CRX depth", depth)),
        }
    }
}

fn row_truncated(stride: usize, height: usize, y: usize) -> Error {
    Error::Codec(CodecError::Truncated {
        expected: stride * height,
        produced: y * stride,
    })
}

/// Undo the per-row filters of a compression 2/3 stream
pub fn unfilter_rows(raw: &[u8], width: usize, height: usize, pixel_size: usize) -> Result<Vec<u8>> {
    let stride = width * pixel_size;
    let mut out = codec::alloc_output(stride * height)?;
    let zero_row = vec![0u8; stride];
    let mut input = Input::new(raw);

    for y in 0..height {
        let filter = input.u8().ok_or_else(|| row_truncated(stride, height, y))?;
        let (done, rest) = out.split_at_mut(y * stride);
        let above = if y == 0 {
            zero_row.as_slice()
        } else {
            &done[(y - 1) * stride..]
        };
        let row = &mut rest[..stride];

        if filter == 4 {
            for channel in 0..pixel_size {
                unpack_channel_run(&mut input, row, channel, width, pixel_size)
                    .ok_or_else(|| row_truncated(stride, height, y))?;
            }
            continue;
        }

        let deltas = input.take(stride).ok_or_else(|| row_truncated(stride, height, y))?;
        match filter {
            0 => {
                for x in 0..stride {
                    let left = if x >= pixel_size { row[x - pixel_size] } else { 0 };
                    row[x] = deltas[x].wrapping_add(left);
                }
            }
            1 => {
                for x in 0..stride {
                    row[x] = deltas[x].wrapping_add(above[x]);
                }
            }
            2 => {
                for x in 0..stride {
                    let up_left = if x >= pixel_size { above[x - pixel_size] } else { 0 };
                    row[x] = deltas[x].wrapping_add(up_left);
                }
            }
            3 => {
                for x in 0..stride {
                    let up_right = above.get(x + pixel_size).copied().unwrap_or(0);
                    row[x] = deltas[x].wrapping_add(up_right);
                }
            }
            other => return Err(Error::unsupported("CRX row filter", other)),
        }
    }
    Ok(out)
}

/// One channel of a run-length row: two equal bytes are followed by a count
/// of further repeats
fn unpack_channel_run(
    input: &mut Input<'_>,
    row: &mut [u8],
    channel: usize,
    width: usize,
    pixel_size: usize,
) -> Option<()> {
    let mut x = 0;
    let mut value = input.u8()?;
    row[channel] = value;
    x += 1;
    while x < width {
        let b = input.u8()?;
        row[x * pixel_size + channel] = b;
        x += 1;
        if x == width {
            break;
        }
        if b == value {
            let count = usize::from(input.u8()?).min(width - x);
            for _ in 0..count {
                row[x * pixel_size + channel] = b;
                x += 1;
            }
            if x < width {
                value = input.u8()?;
                row[x * pixel_size + channel] = value;
                x += 1;
            }
        } else {
            value = b;
        }
    }
    Some(())
}

/// Reorder `(a, b, g, r)` quads into BGRA and restore alpha
fn reorder_alpha(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(4) {
        let alpha = px[0];
        px.copy_within(1..4, 0);
        px[3] = !alpha;
    }
}

fn zlib_stream<'a>(data: &'a [u8], header: &CrxHeader) -> Result<&'a [u8]> {
    let mut input = Input::new(data);
    if header.compression >= 3 {
        let count = input
            .u32_le()
            .ok_or_else(|| Error::CorruptData("CRX prefix table truncated".into()))?;
        input
            .take((count as usize).saturating_mul(EXTRA_RECORD_SIZE))
            .ok_or_else(|| Error::CorruptData("CRX prefix table truncated".into()))?;
    }
    let stream = if header.flags & FLAG_LENGTH_PREFIX != 0 {
        let len = input
            .u32_le()
            .ok_or_else(|| Error::CorruptData("CRX stream length missing".into()))?;
        input.take(len as usize)
    } else {
        data.get(input.position()..)
    };
    stream.ok_or_else(|| Error::CorruptData("CRX zlib stream truncated".into()))
}

/// Decode a CRXG image
pub fn decode(data: &[u8]) -> Result<ImageFrame> {
    let header = CrxHeader::read(&mut Cursor::new(data)).map_err(header_mismatch)?;
    let (width, height) = (u32::from(header.width), u32::from(header.height));
    check_dimensions(width, height)?;
    let order = header.channel_order()?;
    let pixel_size = order.bytes_per_pixel();
    trace!(
        "CRX {}x{} depth {:#x} compression {}",
        width, height, header.depth, header.compression
    );

    let mut pos = HEADER_SIZE;
    let palette = if order == ChannelOrder::Indexed {
        let table = data
            .get(pos..pos + PALETTE_SIZE)
            .ok_or_else(|| Error::CorruptData("CRX palette truncated".into()))?;
        pos += PALETTE_SIZE;
        Some(
            table
                .chunks_exact(3)
                .map(|c| Color::rgb(c[0], c[1], c[2]))
                .collect::<Vec<_>>(),
        )
    } else {
        None
    };
    let body = data.get(pos..).unwrap_or_default();

    let frame = match header.compression {
        1 => {
            let stride = (width as usize * pixel_size + 3) & !3;
            let pixels = codec::crx::unpack_v1(body, stride * height as usize)?;
            ImageFrame::new(width, height, order, stride, pixels)?
        }
        2 | 3 => {
            let stride = width as usize * pixel_size;
            let limit = 2 * (stride + 1) * height as usize;
            let raw = zlib::inflate(zlib_stream(body, &header)?, limit)?;
            let mut pixels = unfilter_rows(&raw, width as usize, height as usize, pixel_size)?;
            if order == ChannelOrder::Bgra {
                reorder_alpha(&mut pixels);
            }
            ImageFrame::packed(width, height, order, pixels)?
        }
        other => return Err(Error::unsupported("CRX compression", other)),
    };

    let frame = frame.with_offset(i32::from(header.offset_x), i32::from(header.offset_y));
    Ok(match palette {
        Some(palette) => frame.with_palette(palette),
        None => frame,
    })
}
