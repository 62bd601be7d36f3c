//! `TYP1` images
//!
//! Header: signature, bit depth (8, 24 or 32), width and height as `u16`.
//! 8-bit images carry a 256-entry BGRA palette next, then every image has
//! one `u32` packed length per plane and the AZ-packed planes in B, G, R, A
//! order.

use crate::codec::{self, Input};
use crate::error::{Error, Result};
use crate::image::{ChannelOrder, Color, ImageFrame, check_dimensions, interleave_planes};

const PALETTE_SIZE: usize = 256 * 4;

/// Decode a TYP1 image
pub fn decode(data: &[u8]) -> Result<ImageFrame> {
    if !data.starts_with(b"TYP1") {
        return Err(Error::mismatch("not a TYP1 image"));
    }
    let mut input = Input::new(&data[4..]);
    let truncated = || Error::CorruptData("TYP1 header truncated".into());
    let bpp = input.u8().ok_or_else(truncated)?;
    let width = u32::from(input.u16_le().ok_or_else(truncated)?);
    let height = u32::from(input.u16_le().ok_or_else(truncated)?);
    check_dimensions(width, height)?;

    let (order, plane_count) = match bpp {
        8 => (ChannelOrder::Indexed, 1),
        24 => (ChannelOrder::Bgr, 3),
        32 => (ChannelOrder::Bgra, 4),
        other => return Err(Error::unsupported("TYP1 bit depth", other)),
    };

    let palette = if bpp == 8 {
        let bytes = input.take(PALETTE_SIZE).ok_or_else(truncated)?;
        Some(
            bytes
                .chunks_exact(4)
                .map(|q| Color::from_bgra([q[0], q[1], q[2], q[3]]))
                .collect::<Vec<_>>(),
        )
    } else {
        None
    };

    let mut lens = Vec::with_capacity(plane_count);
    for _ in 0..plane_count {
        lens.push(input.u32_le().ok_or_else(truncated)? as usize);
    }

    let plane_len = width as usize * height as usize;
    let mut planes = Vec::with_capacity(plane_count);
    for (i, len) in lens.into_iter().enumerate() {
        let packed = input
            .take(len)
            .ok_or_else(|| Error::CorruptData(format!("TYP1 plane {i} truncated")))?;
        planes.push(codec::azsys::unpack(packed, plane_len)?);
    }

    let refs: Vec<&[u8]> = planes.iter().map(Vec::as_slice).collect();
    let frame = ImageFrame::packed(width, height, order, interleave_planes(&refs))?;
    Ok(match palette {
        Some(palette) => frame.with_palette(palette),
        None => frame,
    })
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::codec::azsys::pack_literals;

    fn build(bpp: u8, width: u16, height: u16, palette: Option<&[u8]>, planes: &[&[u8]]) -> Vec<u8> {
        let mut out = b"TYP1".to_vec();
        out.push(bpp);
        out.extend_from_slice(&width.to_le_bytes());
        out.extend_from_slice(&height.to_le_bytes());
        if let Some(palette) = palette {
            out.extend_from_slice(palette);
        }
        let packed: Vec<Vec<u8>> = planes.iter().map(|p| pack_literals(p)).collect();
        for p in &packed {
            out.extend_from_slice(&(p.len() as u32).to_le_bytes());
        }
        for p in packed {
            out.extend(p);
        }
        out
    }

    #[test]
    fn test_decode_24bpp() {
        let data = build(24, 2, 1, None, &[&[1, 2], &[3, 4], &[5, 6]]);
        let frame = decode(&data).unwrap();
        assert_eq!(frame.pixels, [1, 3, 5, 2, 4, 6]);
        assert!(frame.palette.is_none());
    }

    #[test]
    fn test_decode_indexed() {
        let mut palette = vec![0u8; PALETTE_SIZE];
        palette[4..8].copy_from_slice(&[10, 20, 30, 40]);
        let data = build(8, 2, 2, Some(&palette), &[&[0, 1, 1, 0]]);
        let frame = decode(&data).unwrap();
        assert_eq!(frame.channel_order, ChannelOrder::Indexed);
        assert_eq!(frame.pixels, [0, 1, 1, 0]);
        let palette = frame.palette.unwrap();
        assert_eq!(palette.len(), 256);
        assert_eq!(palette[1], Color { b: 10, g: 20, r: 30, a: 40 });
    }

    #[test]
    fn test_rejects_depth_and_size() {
        let data = build(16, 1, 1, None, &[]);
        assert!(matches!(decode(&data), Err(Error::UnsupportedVariant { .. })));
        let data = build(24, 0, 1, None, &[]);
        assert!(matches!(decode(&data), Err(Error::UnsupportedVariant { .. })));
    }
}
