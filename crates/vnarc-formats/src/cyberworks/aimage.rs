//! AImage pictures
//!
//! A type byte is followed by eight `u32` header fields whose physical order
//! varies per game ([`AImageScheme::header_order`]). The body holds the
//! color bitmap, the alpha bitmap, the color bytes and the alpha bytes, in
//! that order. A set bitmap bit codes a new value; a clear bit inherits the
//! pixel of the baseline image, or transparent black without one.
//!
//! Differential images (`base_flag == 1`) take as baseline the nearest
//! earlier image in the same archive with equal dimensions.

use tracing::debug;

use crate::archive::Archive;
use crate::bitstream::MsbBitStream;
use crate::codec::{CodecError, Input};
use crate::entry::{Entry, EntryKind};
use crate::error::{Error, Result};
use crate::image::{ChannelOrder, ImageFrame, check_dimensions};
use crate::scheme::AImageScheme;
use crate::source::NoCompanions;

/// Type byte plus eight header words
pub const HEADER_SIZE: usize = 1 + 8 * 4;

/// Logical AImage header fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AImageHeader {
    /// 1 for differential images
    pub base_flag: u32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Length of the color byte stream
    pub rgb_len: u32,
    /// Length of the alpha byte stream
    pub alpha_len: u32,
    /// Length of the color bitmap
    pub rgb_bits_len: u32,
    /// Length of the alpha bitmap
    pub alpha_bits_len: u32,
    /// Coding version, 1 to 6
    pub version: u32,
}

impl AImageHeader {
    /// Read the header fields in the order `scheme` defines
    pub fn parse(data: &[u8], scheme: &AImageScheme) -> Result<Self> {
        if data.first() != Some(&scheme.value3) {
            return Err(Error::mismatch("not an AImage"));
        }
        let field = |logical: usize| -> Result<u32> {
            let pos = 1 + 4 * usize::from(scheme.header_order[logical]);
            data.get(pos..pos + 4)
                .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .ok_or_else(|| Error::CorruptData("AImage header truncated".into()))
        };
        Ok(Self {
            base_flag: field(0)?,
            width: field(1)?,
            height: field(2)?,
            rgb_len: field(3)?,
            alpha_len: field(4)?,
            rgb_bits_len: field(5)?,
            alpha_bits_len: field(6)?,
            version: field(7)?,
        })
    }

    /// Differential image needing a baseline
    pub fn is_differential(&self) -> bool {
        self.base_flag == 1
    }
}

struct Streams<'a> {
    rgb_bits: MsbBitStream<'a>,
    alpha_bits: MsbBitStream<'a>,
    rgb: Input<'a>,
    alpha: Input<'a>,
}

impl<'a> Streams<'a> {
    fn split(data: &'a [u8], header: &AImageHeader) -> Result<Self> {
        let mut body = Input::new(data.get(HEADER_SIZE..).unwrap_or_default());
        let mut next = |len: u32| {
            body.take(len as usize)
                .ok_or_else(|| Error::CorruptData("AImage body truncated".into()))
        };
        Ok(Self {
            rgb_bits: MsbBitStream::new(next(header.rgb_bits_len)?),
            alpha_bits: MsbBitStream::new(next(header.alpha_bits_len)?),
            rgb: Input::new(next(header.rgb_len)?),
            alpha: Input::new(next(header.alpha_len)?),
        })
    }
}

/// Decode an AImage against an optional baseline
pub fn decode(
    data: &[u8],
    scheme: &AImageScheme,
    baseline: Option<&ImageFrame>,
) -> Result<ImageFrame> {
    let header = AImageHeader::parse(data, scheme)?;
    check_dimensions(header.width, header.height)?;
    if !(1..=6).contains(&header.version) {
        return Err(Error::unsupported("AImage version", header.version));
    }
    let baseline = baseline.map(|frame| frame.pixels.as_slice());
    let len = header.width as usize * header.height as usize * 4;
    if baseline.is_some_and(|pixels| pixels.len() != len) {
        return Err(Error::CorruptData("AImage baseline size differs".into()));
    }

    let mut streams = Streams::split(data, &header)?;
    let mut pixels = vec![0u8; len];
    let truncated = |pos: usize| Error::Codec(CodecError::Truncated { expected: len, produced: pos });
    let mask = scheme.value1;

    for (i, px) in pixels.chunks_exact_mut(4).enumerate() {
        let pos = i * 4;
        let inherited = baseline.map_or([0; 4], |base| {
            [base[pos], base[pos + 1], base[pos + 2], base[pos + 3]]
        });

        let new_color = streams.rgb_bits.get_next_bit().ok_or_else(|| truncated(pos))?;
        if new_color {
            let bgr = streams.rgb.take(3).ok_or_else(|| truncated(pos))?;
            px[0] = bgr[0] ^ mask;
            px[1] = bgr[1] ^ mask;
            px[2] = bgr[2] ^ mask;
        } else {
            px[..3].copy_from_slice(&inherited[..3]);
        }

        px[3] = if header.version < 6 {
            if new_color { scheme.value2 } else { inherited[3] }
        } else if streams.alpha_bits.get_next_bit().ok_or_else(|| truncated(pos))? {
            streams.alpha.u8().ok_or_else(|| truncated(pos))? ^ mask
        } else {
            inherited[3]
        };
    }

    ImageFrame::packed(header.width, header.height, ChannelOrder::Bgra, pixels)
}

/// Nearest earlier AImage of the same size in `archive`
fn find_baseline(
    archive: &Archive,
    entry: &Entry,
    header: &AImageHeader,
    scheme: &AImageScheme,
    depth: usize,
) -> Result<Option<ImageFrame>> {
    let Some(index) = archive.entries().iter().position(|e| e == entry) else {
        return Ok(None);
    };
    let earlier = archive.entries()[..index]
        .iter()
        .rev()
        .filter(|e| e.kind == EntryKind::Image);
    for candidate in earlier {
        let data = match archive.open_entry(candidate) {
            Ok(data) => data,
            Err(e) => {
                debug!("Skipping baseline candidate {}: {}", candidate.name, e);
                continue;
            }
        };
        let Ok(found) = AImageHeader::parse(&data, scheme) else {
            continue;
        };
        if (found.width, found.height) == (header.width, header.height) {
            debug!("Baseline of {} is {}", entry.name, candidate.name);
            return archive
                .decode_image_at_depth(candidate, &NoCompanions, depth + 1)
                .map(Some);
        }
    }
    debug!("No baseline for differential image {}", entry.name);
    Ok(None)
}

/// Decode an AImage entry of `archive`, following differential baselines
pub fn decode_entry(
    archive: &Archive,
    entry: &Entry,
    data: &[u8],
    scheme: &AImageScheme,
    depth: usize,
) -> Result<ImageFrame> {
    let header = AImageHeader::parse(data, scheme)?;
    let baseline = if header.is_differential() {
        find_baseline(archive, entry, &header, scheme, depth)?
    } else {
        None
    };
    decode(data, scheme, baseline.as_ref())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use crate::archive::{ArchiveFormat, OpenContext};
    use crate::cyberworks::dat::tests::{TocFile, build_series};
    use crate::scheme::SchemeRegistry;
    use crate::source::{ByteSource, MemoryResolver};
    use pretty_assertions::assert_eq;

    const IDENTITY: [u8; 8] = [0, 1, 2, 3, 4, 5, 6, 7];

    fn scheme(value1: u8, header_order: [u8; 8]) -> AImageScheme {
        AImageScheme {
            value1,
            value2: 0xFF,
            value3: 98,
            header_order,
            bell: false,
        }
    }

    /// Fields in logical order; streams in body order
    pub(crate) fn build(
        scheme: &AImageScheme,
        fields: [u32; 8],
        rgb_bits: &[u8],
        alpha_bits: &[u8],
        rgb: &[u8],
        alpha: &[u8],
    ) -> Vec<u8> {
        let mut physical = [0u32; 8];
        for (logical, &slot) in scheme.header_order.iter().enumerate() {
            physical[usize::from(slot)] = fields[logical];
        }
        let mut out = vec![scheme.value3];
        for v in physical {
            out.extend_from_slice(&v.to_le_bytes());
        }
        for stream in [rgb_bits, alpha_bits, rgb, alpha] {
            out.extend_from_slice(stream);
        }
        out
    }

    /// Full 2x1 image, version 1
    fn full_image(scheme: &AImageScheme) -> Vec<u8> {
        let rgb = [1, 2, 3, 4, 5, 6];
        build(scheme, [0, 2, 1, 6, 0, 1, 0, 1], &[0b1100_0000], &[], &rgb, &[])
    }

    /// Differential 2x1 image replacing only the second pixel, version 1
    fn diff_image(scheme: &AImageScheme) -> Vec<u8> {
        build(scheme, [1, 2, 1, 3, 0, 1, 0, 1], &[0b0100_0000], &[], &[7, 8, 9], &[])
    }

    #[test]
    fn test_header_order() {
        let shuffled = scheme(0, [7, 6, 5, 4, 3, 2, 1, 0]);
        let data = full_image(&shuffled);
        let header = AImageHeader::parse(&data, &shuffled).unwrap();
        assert_eq!((header.width, header.height, header.version), (2, 1, 1));
        assert_eq!(u32::from_le_bytes(data[29..33].try_into().unwrap()), 0);
        assert_eq!(u32::from_le_bytes(data[25..29].try_into().unwrap()), 2);
    }

    #[test]
    fn test_version1_full() {
        let scheme = scheme(0, IDENTITY);
        let frame = decode(&full_image(&scheme), &scheme, None).unwrap();
        assert_eq!(frame.channel_order, ChannelOrder::Bgra);
        assert_eq!(frame.pixels, [1, 2, 3, 0xFF, 4, 5, 6, 0xFF]);
    }

    #[test]
    fn test_xor_mask() {
        let scheme = scheme(0x0F, IDENTITY);
        let frame = decode(&full_image(&scheme), &scheme, None).unwrap();
        assert_eq!(frame.pixels, [0x0E, 0x0D, 0x0C, 0xFF, 0x0B, 0x0A, 0x09, 0xFF]);
    }

    #[test]
    fn test_version1_without_baseline_is_transparent() {
        let scheme = scheme(0, IDENTITY);
        let frame = decode(&diff_image(&scheme), &scheme, None).unwrap();
        assert_eq!(frame.pixels, [0, 0, 0, 0, 7, 8, 9, 0xFF]);
    }

    #[test]
    fn test_version6_separate_alpha() {
        let scheme = scheme(0, IDENTITY);
        let base = decode(&full_image(&scheme), &scheme, None).unwrap();
        let data = build(
            &scheme,
            [1, 2, 1, 0, 1, 1, 1, 6],
            &[0b0000_0000],
            &[0b1000_0000],
            &[],
            &[0x40],
        );
        let frame = decode(&data, &scheme, Some(&base)).unwrap();
        assert_eq!(frame.pixels, [1, 2, 3, 0x40, 4, 5, 6, 0xFF]);
    }

    #[test]
    fn test_rejects_bad_input() {
        let scheme = scheme(0, IDENTITY);
        let data = build(&scheme, [0, 2, 1, 6, 0, 1, 0, 9], &[0xC0], &[], &[0; 6], &[]);
        assert!(matches!(decode(&data, &scheme, None), Err(Error::UnsupportedVariant { .. })));

        let data = build(&scheme, [0, 2, 1, 3, 0, 1, 0, 1], &[0xC0], &[], &[0; 3], &[]);
        assert!(decode(&data, &scheme, None).unwrap_err().is_truncated());

        assert!(decode(b"\x01rest", &scheme, None).unwrap_err().is_mismatch());
    }

    #[test]
    fn test_differential_entry_in_archive() {
        let registry = SchemeRegistry::new().with_cyberworks("Game", scheme(0, IDENTITY));
        let scheme = scheme(0, IDENTITY);
        let full = full_image(&scheme);
        let diff = diff_image(&scheme);
        let files = [
            TocFile { id: 1, kind: b'a', archive: 2, body: &full, packed: false },
            TocFile { id: 2, kind: b'c', archive: 2, body: b"text", packed: false },
            TocFile { id: 3, kind: b'b', archive: 2, body: &diff, packed: true },
        ];
        let (toc, archives) = build_series(&files, false);
        let companions = MemoryResolver::new().with("arc01.dat", toc);
        let ctx = OpenContext::new("arc02.dat", &registry, &companions).with_title("Game");
        let archive =
            Archive::open_as(ArchiveFormat::Cyberworks, ByteSource::from(archives[0].clone()), &ctx)
                .unwrap();

        let entry = archive.find("00003.aimg").unwrap();
        let frame = archive.decode_image(entry).unwrap();
        assert_eq!(frame.pixels, [1, 2, 3, 0xFF, 7, 8, 9, 0xFF]);
    }
}
