//! PAC archives
//!
//! Records are `name[len], size, offset`. Amuse Craft archives start with
//! `PAC ` and keep the count at 8 with records from 0x804. Classic archives
//! keep the count at 0 with records from 0x3FE; their name length (0x20 or
//! 0x10) is inferred from where the first entry's data begins.

use tracing::{debug, trace};

use crate::archive::{ArchiveCodec, Directory, FormatState, OpenContext};
use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::source::ByteSource;
use crate::util::{is_sane_count, name_from_field};

const AMUSE_SIGNATURE: &[u8] = b"PAC ";
const AMUSE_INDEX_START: u64 = 0x804;
const CLASSIC_INDEX_START: u64 = 0x3FE;
const CLASSIC_NAME_SIZES: [u64; 2] = [0x20, 0x10];

const SCRIPT_MARK: u8 = b'$';
const SCRIPT_HEADER: usize = 16;
const SCRIPT_KEY: u32 = 0xF7D5_859D;

/// Decrypt a `$` script in place
///
/// Starting at byte 16, every whole 4-byte chunk has its first byte rotated
/// left by a shift that starts at 4 and grows per chunk, and is then XOR-ed
/// with a fixed key as a little-endian word.
pub fn decrypt_script(data: &mut [u8]) {
    if data.len() <= SCRIPT_HEADER || data[0] != SCRIPT_MARK {
        return;
    }
    let mut shift = 4u32;
    for chunk in data[SCRIPT_HEADER..].chunks_exact_mut(4) {
        chunk[0] = chunk[0].rotate_left(shift & 7);
        let word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) ^ SCRIPT_KEY;
        chunk.copy_from_slice(&word.to_le_bytes());
        shift += 1;
    }
}

/// Softpal PAC archive
#[derive(Debug, Clone, Copy, Default)]
pub struct PacOpener;

impl PacOpener {
    fn read_records(
        source: &ByteSource,
        start: u64,
        count: u32,
        name_size: u64,
    ) -> Result<Vec<Entry>> {
        let record_size = name_size + 8;
        let index_end = start + u64::from(count) * record_size;
        if index_end > source.len() {
            return Err(Error::mismatch("PAC index exceeds the file"));
        }

        let mut entries = Vec::with_capacity(count as usize);
        for i in 0..u64::from(count) {
            let record = start + i * record_size;
            let name = name_from_field(source.slice(record, name_size as usize)?);
            let size = source.read_u32_le(record + name_size)?;
            let offset = source.read_u32_le(record + name_size + 4)?;
            if name.is_empty() {
                debug!("Dropping PAC record {}: empty name", i);
                continue;
            }
            if u64::from(offset) < index_end {
                debug!("Dropping PAC entry {}: data inside the index", name);
                continue;
            }
            match Entry::checked(name, u64::from(offset), u64::from(size), source) {
                Some(entry) => entries.push(entry),
                None => debug!("Dropping PAC record {}: {:#x}+{:#x} outside the archive", i, offset, size),
            }
        }
        Ok(entries)
    }

    fn classic_name_size(source: &ByteSource, count: u32) -> Option<u64> {
        CLASSIC_NAME_SIZES.into_iter().find(|&name_size| {
            let expected = CLASSIC_INDEX_START + (name_size + 8) * u64::from(count);
            let first_offset = source.read_u32_le(CLASSIC_INDEX_START + name_size + 4);
            trace!("PAC name size {:#x}: first data expected at {:#x}", name_size, expected);
            first_offset.is_ok_and(|offset| u64::from(offset) == expected)
        })
    }
}

impl ArchiveCodec for PacOpener {
    fn tag(&self) -> &'static str {
        "Softpal/PAC"
    }

    fn probe(&self, source: &ByteSource, ctx: &OpenContext<'_>) -> bool {
        source.has_signature(0, AMUSE_SIGNATURE)
            || (ctx.extension().as_deref() == Some("pac") && source.len() >= CLASSIC_INDEX_START)
    }

    fn parse_index(&self, source: &ByteSource, _ctx: &OpenContext<'_>) -> Result<Directory> {
        let (count, start, name_size) = if source.has_signature(0, AMUSE_SIGNATURE) {
            (source.read_u32_le(8)?, AMUSE_INDEX_START, 0x20)
        } else {
            let count = source.read_u32_le(0)?;
            if count == 0 {
                return Ok(Directory::plain(Vec::new()));
            }
            let name_size = Self::classic_name_size(source, count)
                .ok_or_else(|| Error::mismatch("PAC first entry does not follow the index"))?;
            (count, CLASSIC_INDEX_START, name_size)
        };

        if count == 0 {
            return Ok(Directory::plain(Vec::new()));
        }
        if !is_sane_count(count) {
            return Err(Error::mismatch(format!("PAC entry count {count}")));
        }
        let entries = Self::read_records(source, start, count, name_size)?;
        debug!("PAC with {:#x}-byte names: {} of {} entries", name_size, entries.len(), count);
        Ok(Directory::plain(entries))
    }

    fn open_entry(
        &self,
        source: &ByteSource,
        _state: &FormatState,
        entry: &Entry,
    ) -> Result<Vec<u8>> {
        let mut data = source.read_at(entry.offset, entry.size as usize)?;
        if data.len() > SCRIPT_HEADER && data[0] == SCRIPT_MARK {
            trace!("Decrypting PAC script {}", entry.name);
            decrypt_script(&mut data);
        }
        Ok(data)
    }
}
