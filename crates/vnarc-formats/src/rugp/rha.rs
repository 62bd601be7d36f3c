//! `RHA` audio
//!
//! MPEG Layer III frames with their 4-byte headers stripped. The stream
//! header carries the fields every frame shares; each frame keeps only its
//! padding bit. [`to_mp3`] puts the headers back.

use binrw::BinRead;
use binrw::io::Cursor;
use tracing::debug;

use crate::codec::truncated;
use crate::error::{Error, Result, header_mismatch};

/// Stream signature
pub const SIGNATURE: &[u8; 4] = b"RHA\0";

/// Size of the stream header
pub const HEADER_SIZE: usize = 0x10;

const FRAME_HEADER_SIZE: usize = 4;

#[rustfmt::skip]
const BITRATES_MPEG1: [u32; 15] = [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320];
#[rustfmt::skip]
const BITRATES_MPEG2: [u32; 15] = [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160];

/// MPEG audio version as stored in the frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    Mpeg1,
    Mpeg2,
    Mpeg25,
}

impl MpegVersion {
    fn from_id(id: u8) -> Option<Self> {
        match id {
            3 => Some(Self::Mpeg1),
            2 => Some(Self::Mpeg2),
            0 => Some(Self::Mpeg25),
            _ => None,
        }
    }

    const fn id(self) -> u8 {
        match self {
            Self::Mpeg1 => 3,
            Self::Mpeg2 => 2,
            Self::Mpeg25 => 0,
        }
    }

    const fn sample_rates(self) -> [u32; 3] {
        match self {
            Self::Mpeg1 => [44100, 48000, 32000],
            Self::Mpeg2 => [22050, 24000, 16000],
            Self::Mpeg25 => [11025, 12000, 8000],
        }
    }

    const fn bitrates(self) -> &'static [u32; 15] {
        match self {
            Self::Mpeg1 => &BITRATES_MPEG1,
            Self::Mpeg2 | Self::Mpeg25 => &BITRATES_MPEG2,
        }
    }

    /// Layer III samples per frame divided by 8
    const fn slot_factor(self) -> u32 {
        match self {
            Self::Mpeg1 => 144,
            Self::Mpeg2 | Self::Mpeg25 => 72,
        }
    }
}

/// RHA stream header
#[derive(Debug, Clone, PartialEq, Eq, BinRead)]
#[br(little, magic = b"RHA\0")]
pub struct RhaHeader {
    pub version: u8,
    /// 3 MPEG-1, 2 MPEG-2, 0 MPEG-2.5
    pub mpeg_version: u8,
    pub bitrate_index: u8,
    pub sample_rate_index: u8,
    /// 0 stereo, 1 joint stereo, 2 dual channel, 3 mono
    pub channel_mode: u8,
    pub reserved: [u8; 3],
    pub frame_count: u32,
}

/// Validated frame parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    pub version: MpegVersion,
    pub bitrate_index: u8,
    pub sample_rate_index: u8,
    pub channel_mode: u8,
}

impl FrameLayout {
    /// Check the shared header fields
    pub fn from_header(header: &RhaHeader) -> Result<Self> {
        let version = MpegVersion::from_id(header.mpeg_version)
            .ok_or_else(|| Error::unsupported("RHA MPEG version", header.mpeg_version))?;
        if !(1..=14).contains(&header.bitrate_index) {
            return Err(Error::unsupported("RHA bitrate index", header.bitrate_index));
        }
        if header.sample_rate_index > 2 {
            return Err(Error::unsupported(
                "RHA sample rate index",
                header.sample_rate_index,
            ));
        }
        if header.channel_mode > 3 {
            return Err(Error::unsupported("RHA channel mode", header.channel_mode));
        }
        Ok(Self {
            version,
            bitrate_index: header.bitrate_index,
            sample_rate_index: header.sample_rate_index,
            channel_mode: header.channel_mode,
        })
    }

    /// Whole frame length including the 4-byte header
    pub fn frame_len(&self, padding: bool) -> usize {
        let bitrate = self.version.bitrates()[usize::from(self.bitrate_index)] * 1000;
        let sample_rate = self.version.sample_rates()[usize::from(self.sample_rate_index)];
        (self.version.slot_factor() * bitrate / sample_rate) as usize + usize::from(padding)
    }

    /// Layer III frame header without CRC protection
    pub fn header_bytes(&self, padding: bool) -> [u8; 4] {
        [
            0xFF,
            0xE0 | self.version.id() << 3 | 0b01 << 1 | 1,
            self.bitrate_index << 4 | self.sample_rate_index << 2 | u8::from(padding) << 1,
            self.channel_mode << 6,
        ]
    }
}

/// Rebuild a plain MP3 stream from RHA data
pub fn to_mp3(data: &[u8]) -> Result<Vec<u8>> {
    let header = RhaHeader::read(&mut Cursor::new(data)).map_err(header_mismatch)?;
    let layout = FrameLayout::from_header(&header)?;
    debug!(
        "RHA {:?}: {} frames, bitrate index {}, sample rate index {}",
        layout.version, header.frame_count, layout.bitrate_index, layout.sample_rate_index
    );

    let frame_count = header.frame_count as usize;
    let mut out = Vec::with_capacity(data.len() + frame_count.min(data.len()) * FRAME_HEADER_SIZE);
    let mut pos = HEADER_SIZE;
    for _ in 0..frame_count {
        let Some(&padding) = data.get(pos) else {
            return Err(truncated(pos + 1, data.len()).into());
        };
        let padding = padding != 0;
        let body_len = layout.frame_len(padding) - FRAME_HEADER_SIZE;
        let body = data
            .get(pos + 1..pos + 1 + body_len)
            .ok_or_else(|| truncated(pos + 1 + body_len, data.len()))?;
        out.extend_from_slice(&layout.header_bytes(padding));
        out.extend_from_slice(body);
        pos += 1 + body_len;
    }
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    /// MPEG-1 128 kbps 44.1 kHz joint stereo stream
    pub(crate) fn build_rha(frames: &[bool]) -> Vec<u8> {
        let mut out = SIGNATURE.to_vec();
        out.extend_from_slice(&[1, 3, 9, 0, 1, 0, 0, 0]);
        out.extend_from_slice(&(frames.len() as u32).to_le_bytes());
        for (i, &padding) in frames.iter().enumerate() {
            out.push(u8::from(padding));
            out.extend(std::iter::repeat_n(i as u8, 413 + usize::from(padding)));
        }
        out
    }

    fn layout() -> FrameLayout {
        FrameLayout {
            version: MpegVersion::Mpeg1,
            bitrate_index: 9,
            sample_rate_index: 0,
            channel_mode: 1,
        }
    }

    #[test]
    fn test_frame_length() {
        assert_eq!(layout().frame_len(false), 417);
        assert_eq!(layout().frame_len(true), 418);

        let mpeg2 = FrameLayout {
            version: MpegVersion::Mpeg2,
            bitrate_index: 8,
            sample_rate_index: 0,
            channel_mode: 3,
        };
        // 72 * 64000 / 22050
        assert_eq!(mpeg2.frame_len(false), 208);
    }

    #[test]
    fn test_header_bytes() {
        assert_eq!(layout().header_bytes(false), [0xFF, 0xFB, 0x90, 0x40]);
        assert_eq!(layout().header_bytes(true), [0xFF, 0xFB, 0x92, 0x40]);
    }

    #[test]
    fn test_rebuild_stream() {
        let mp3 = to_mp3(&build_rha(&[false, true])).unwrap();
        assert_eq!(mp3.len(), 417 + 418);
        assert_eq!(mp3[..4], [0xFF, 0xFB, 0x90, 0x40]);
        assert_eq!(mp3[417..421], [0xFF, 0xFB, 0x92, 0x40]);
        assert!(mp3[421..].iter().all(|&b| b == 1));
    }

    #[test]
    fn test_truncated_frame() {
        let mut data = build_rha(&[false, false]);
        data.truncate(data.len() - 1);
        assert!(to_mp3(&data).unwrap_err().is_truncated());
    }

    #[test]
    fn test_bad_fields() {
        let mut data = build_rha(&[]);
        data[5] = 1;
        assert!(matches!(
            to_mp3(&data),
            Err(Error::UnsupportedVariant { .. })
        ));
        let mut data = build_rha(&[]);
        data[6] = 15;
        assert!(matches!(
            to_mp3(&data),
            Err(Error::UnsupportedVariant { .. })
        ));
        assert!(to_mp3(b"RIFF").unwrap_err().is_mismatch());
    }
}
