//! PIC images
//!
//! Each color plane is an MSB-first bitstream of 8x8 blocks in raster
//! order. A block is either flat or a DC value plus 63 table-coded deltas
//! that accumulate along [`BLOCK_TREE`].

use binrw::BinRead;
use binrw::io::Cursor;

use crate::bitstream::MsbBitStream;
use crate::codec::CodecError;
use crate::error::{Error, Result, header_mismatch};
use crate::image::{ChannelOrder, ImageFrame, check_dimensions, interleave_planes};

/// Size of the fixed header
pub const HEADER_SIZE: usize = 10;

const BLOCK: usize = 8;

/// `(dst, src)` pairs: delta `i` lands on `dst` of pair `i`, and the pairs
/// are then applied in order as `v[dst] += v[src]`
#[rustfmt::skip]
pub const BLOCK_TREE: [(u8, u8); 63] = [
    (1, 0), (2, 1), (3, 2), (4, 3), (5, 4), (6, 5), (7, 6), (8, 0),
    (9, 1), (10, 2), (11, 3), (12, 4), (13, 5), (14, 6), (15, 7), (16, 8),
    (17, 9), (18, 10), (19, 11), (20, 12), (21, 13), (22, 14), (23, 15), (24, 16),
    (25, 17), (26, 18), (27, 19), (28, 20), (29, 21), (30, 22), (31, 23), (32, 24),
    (33, 25), (34, 26), (35, 27), (36, 28), (37, 29), (38, 30), (39, 31), (40, 32),
    (41, 33), (42, 34), (43, 35), (44, 36), (45, 37), (46, 38), (47, 39), (48, 40),
    (49, 41), (50, 42), (51, 43), (52, 44), (53, 45), (54, 46), (55, 47), (56, 48),
    (57, 49), (58, 50), (59, 51), (60, 52), (61, 53), (62, 54), (63, 55),
];

/// Deltas of 2-bit codes
pub const VALUES_2BIT: [i8; 4] = [0, 1, -1, 2];

/// Deltas of 4-bit codes
pub const VALUES_4BIT: [i8; 16] = [0, 1, -1, 2, -2, 3, -3, 4, -4, 6, -6, 8, -8, 12, -12, 16];

/// Deltas of 6-bit codes
#[rustfmt::skip]
pub const VALUES_6BIT: [i8; 64] = [
    0, 1, -1, 2, -2, 3, -3, 4, -4, 5, -5, 6, -6, 7, -7, 8,
    -8, 9, -9, 10, -10, 11, -11, 12, -12, 13, -13, 14, -14, 15, -15, 16,
    -16, 17, -17, 18, -18, 19, -19, 20, -20, 21, -21, 22, -22, 23, -23, 24,
    -24, 25, -25, 26, -26, 27, -27, 28, -28, 29, -29, 30, -30, 31, -31, 32,
];

/// PIC header
#[derive(Debug, Clone, PartialEq, Eq, BinRead)]
#[br(little, magic = b"PIC\0")]
pub struct PicHeader {
    /// Width in pixels
    pub width: u16,
    /// Height in pixels
    pub height: u16,
    /// 24 or 32
    pub bpp: u16,
}

fn read_block(bits: &mut MsbBitStream<'_>) -> Option<[u8; 64]> {
    let ctl = bits.get_bits(2)?;
    let dc = bits.get_bits(8)? as u8;
    let mut v = [dc; 64];
    let (width, table): (u32, &[i8]) = match ctl {
        0 => return Some(v),
        1 => (2, &VALUES_2BIT),
        2 => (4, &VALUES_4BIT),
        _ => (6, &VALUES_6BIT),
    };
    for &(dst, _) in &BLOCK_TREE {
        v[usize::from(dst)] = table[bits.get_bits(width)? as usize] as u8;
    }
    for &(dst, src) in &BLOCK_TREE {
        let (dst, src) = (usize::from(dst), usize::from(src));
        v[dst] = v[dst].wrapping_add(v[src]);
    }
    Some(v)
}

fn decode_plane(stream: &[u8], width: usize, height: usize) -> Result<Vec<u8>> {
    let mut plane = vec![0u8; width * height];
    let mut bits = MsbBitStream::new(stream);
    for by in (0..height).step_by(BLOCK) {
        for bx in (0..width).step_by(BLOCK) {
            let block = read_block(&mut bits).ok_or(CodecError::Truncated {
                expected: plane.len(),
                produced: by * width + bx,
            })?;
            for y in 0..BLOCK.min(height - by) {
                let row = (by + y) * width + bx;
                let count = BLOCK.min(width - bx);
                plane[row..row + count].copy_from_slice(&block[y * BLOCK..y * BLOCK + count]);
            }
        }
    }
    Ok(plane)
}

/// Decode a PIC image
pub fn decode(data: &[u8]) -> Result<ImageFrame> {
    let header = PicHeader::read(&mut Cursor::new(data)).map_err(header_mismatch)?;
    let (width, height) = (u32::from(header.width), u32::from(header.height));
    check_dimensions(width, height)?;
    let (order, plane_count) = match header.bpp {
        24 => (ChannelOrder::Bgr, 3),
        32 => (ChannelOrder::Bgra, 4),
        bpp => return Err(Error::unsupported("PIC depth", bpp)),
    };

    let mut pos = HEADER_SIZE;
    let mut planes = Vec::with_capacity(plane_count);
    for i in 0..plane_count {
        let len = data
            .get(pos..pos + 4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as usize)
            .ok_or_else(|| Error::CorruptData(format!("PIC plane {i} length missing")))?;
        let stream = data
            .get(pos + 4..pos + 4 + len)
            .ok_or_else(|| Error::CorruptData(format!("PIC plane {i} truncated")))?;
        planes.push(decode_plane(stream, width as usize, height as usize)?);
        pos += 4 + len;
    }

    let refs: Vec<&[u8]> = planes.iter().map(Vec::as_slice).collect();
    ImageFrame::packed(width, height, order, interleave_planes(&refs))
}
