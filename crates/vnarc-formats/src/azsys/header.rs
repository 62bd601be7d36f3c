//! ARC header

use binrw::BinRead;
use binrw::io::Cursor;

use crate::error::{Result, header_mismatch};
use crate::util::is_sane_count;

/// Size of the fixed header; the packed index follows it
pub const HEADER_SIZE: usize = 0x30;

/// Size of one unpacked index record
pub const RECORD_SIZE: usize = 0x2C;

/// ARC header (0x30 bytes, little-endian)
#[derive(Debug, Clone, PartialEq, Eq, BinRead)]
#[br(little)]
pub struct ArcHeader {
    /// Signature, always `ARC\x1A`
    #[br(assert(magic == *b"ARC\x1A", "Invalid ARC magic: {:?}", magic))]
    pub magic: [u8; 4],

    /// Number of distinct extensions in the archive
    #[br(assert((1..=8).contains(&ext_count), "Invalid ARC extension count {}", ext_count))]
    pub ext_count: u32,

    /// Number of entries
    #[br(assert(is_sane_count(count), "Invalid ARC entry count {}", count))]
    pub count: u32,

    /// Size of the packed index
    pub packed_index_len: u32,

    /// Size of the unpacked index
    pub index_len: u32,

    /// CRC32 of the packed index
    pub index_crc: u32,

    /// Padding up to 0x30
    pub reserved: [u8; 0x18],
}

impl ArcHeader {
    /// Parse and sanity-check a header; failures are declines
    pub fn parse(data: &[u8]) -> Result<Self> {
        let header = Self::read(&mut Cursor::new(data)).map_err(header_mismatch)?;
        if header.index_len as usize != header.count as usize * RECORD_SIZE {
            return Err(crate::Error::mismatch(format!(
                "ARC index length {:#x} does not fit {} records",
                header.index_len, header.count
            )));
        }
        Ok(header)
    }

    /// Offset entry offsets are relative to
    pub fn data_base(&self) -> u64 {
        HEADER_SIZE as u64 + u64::from(self.packed_index_len)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
pub(crate) fn header_bytes(count: u32, packed_index: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_SIZE);
    out.extend_from_slice(b"ARC\x1A");
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&count.to_le_bytes());
    out.extend_from_slice(&(packed_index.len() as u32).to_le_bytes());
    out.extend_from_slice(&(count * RECORD_SIZE as u32).to_le_bytes());
    out.extend_from_slice(&vnarc_crypto::crc32(packed_index).to_le_bytes());
    out.resize(HEADER_SIZE, 0);
    out
}
