//! `CRXD` differential images
//!
//! At 0x20 a CRXD file holds either a complete `CRXG` image or a `CRXJ`
//! reference: the base image's archive offset and name, followed by a
//! difference image at 0x40. The difference is added to the base colors and
//! subtracted from its alpha where the two rectangles overlap.

use tracing::debug;

use super::crx;
use crate::archive::MAX_IMAGE_CHAIN;
use crate::error::{Error, Result};
use crate::image::{ChannelOrder, ImageFrame};
use crate::util::name_from_field;

/// Offset of the embedded section
const SECTION_OFFSET: usize = 0x20;
/// Offset of the difference image after a `CRXJ` reference
const DIFF_OFFSET: usize = 0x40;
const BASE_NAME_SIZE: usize = 0x18;

/// Looks up base image bytes by archive offset and name
pub type BaseResolver<'a> = dyn FnMut(u32, &str) -> Result<Option<Vec<u8>>> + 'a;

/// Decode a CRXD image, resolving its base through `resolve`
pub fn decode(data: &[u8], resolve: &mut BaseResolver<'_>, depth: usize) -> Result<ImageFrame> {
    if data.get(..4) != Some(&b"CRXD"[..]) {
        return Err(Error::mismatch("not a CRXD image"));
    }
    if depth > MAX_IMAGE_CHAIN {
        return Err(Error::CorruptData(format!(
            "CRXD base chain deeper than {MAX_IMAGE_CHAIN}"
        )));
    }

    let section = data
        .get(SECTION_OFFSET..SECTION_OFFSET + 4)
        .ok_or_else(|| Error::CorruptData("CRXD section missing".into()))?;
    match section {
        b"CRXG" => crx::decode(&data[SECTION_OFFSET..]),
        b"CRXJ" => {
            let reference = data
                .get(SECTION_OFFSET + 4..DIFF_OFFSET)
                .ok_or_else(|| Error::CorruptData("CRXD reference truncated".into()))?;
            let base_offset =
                u32::from_le_bytes([reference[0], reference[1], reference[2], reference[3]]);
            let base_name = name_from_field(&reference[4..4 + BASE_NAME_SIZE]);
            debug!("CRXD base {} at {:#x}, depth {}", base_name, base_offset, depth);

            let diff = crx::decode(&data[DIFF_OFFSET..])?;
            let base_data = resolve(base_offset, &base_name)?.ok_or_else(|| {
                Error::CorruptData(format!("CRXD base {base_name} not found"))
            })?;
            let base = if base_data.starts_with(b"CRXD") {
                decode(&base_data, resolve, depth + 1)?
            } else {
                crx::decode(&base_data)?
            };
            blend(base, &diff)
        }
        other => Err(Error::unsupported(
            "CRXD section",
            u32::from_le_bytes([other[0], other[1], other[2], other[3]]),
        )),
    }
}

/// Apply `diff` to `base` over the intersection of their rectangles
pub fn blend(mut base: ImageFrame, diff: &ImageFrame) -> Result<ImageFrame> {
    if base.channel_order != diff.channel_order
        || !matches!(base.channel_order, ChannelOrder::Bgr | ChannelOrder::Bgra)
    {
        return Err(Error::unsupported("CRXD blend depth", diff.bpp));
    }
    let pixel_size = base.channel_order.bytes_per_pixel();
    let span = |offset: i32, len: u32| (i64::from(offset), i64::from(offset) + i64::from(len));
    let (bx0, bx1) = span(base.offset_x, base.width);
    let (by0, by1) = span(base.offset_y, base.height);
    let (dx0, dx1) = span(diff.offset_x, diff.width);
    let (dy0, dy1) = span(diff.offset_y, diff.height);
    let (x0, x1) = (bx0.max(dx0), bx1.min(dx1));
    let (y0, y1) = (by0.max(dy0), by1.min(dy1));

    for y in y0..y1 {
        for x in x0..x1 {
            let b = (y - by0) as usize * base.stride + (x - bx0) as usize * pixel_size;
            let d = (y - dy0) as usize * diff.stride + (x - dx0) as usize * pixel_size;
            for c in 0..3 {
                base.pixels[b + c] = base.pixels[b + c].wrapping_add(diff.pixels[d + c]);
            }
            if pixel_size == 4 {
                base.pixels[b + 3] = base.pixels[b + 3].wrapping_sub(diff.pixels[d + 3]);
            }
        }
    }
    Ok(base)
}
