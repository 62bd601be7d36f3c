//! Circus PCK archives
//!
//! `count`, a table of `(offset, size)` pairs, and a second table of
//! `(name[0x38], offset, size)` records. Both tables describe the same
//! entries and must agree.

use tracing::debug;

use crate::archive::{ArchiveCodec, Directory, FormatState, OpenContext};
use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::source::ByteSource;
use crate::util::{is_sane_count, name_from_field};

const NAME_SIZE: usize = 0x38;
const NAME_RECORD_SIZE: u64 = NAME_SIZE as u64 + 8;

/// Circus PCK archive
#[derive(Debug, Clone, Copy, Default)]
pub struct PckOpener;

impl PckOpener {
    fn index_end(count: u32) -> u64 {
        4 + u64::from(count) * (8 + NAME_RECORD_SIZE)
    }
}

impl ArchiveCodec for PckOpener {
    fn tag(&self) -> &'static str {
        "Circus/PCK"
    }

    fn probe(&self, source: &ByteSource, _ctx: &OpenContext<'_>) -> bool {
        source
            .read_u32_le(0)
            .is_ok_and(|count| is_sane_count(count) && Self::index_end(count) <= source.len())
    }

    fn parse_index(&self, source: &ByteSource, _ctx: &OpenContext<'_>) -> Result<Directory> {
        let count = source.read_u32_le(0)?;
        if !is_sane_count(count) {
            return Err(Error::mismatch(format!("PCK entry count {count}")));
        }
        let index_end = Self::index_end(count);
        if index_end > source.len() {
            return Err(Error::mismatch("PCK index exceeds the file"));
        }
        let names_start = 4 + u64::from(count) * 8;

        let mut entries = Vec::with_capacity(count as usize);
        for i in 0..u64::from(count) {
            let offset = source.read_u32_le(4 + i * 8)?;
            let size = source.read_u32_le(8 + i * 8)?;
            let record = names_start + i * NAME_RECORD_SIZE;
            let named_offset = source.read_u32_le(record + NAME_SIZE as u64)?;
            let named_size = source.read_u32_le(record + NAME_SIZE as u64 + 4)?;
            if (offset, size) != (named_offset, named_size) {
                return Err(Error::mismatch(format!("PCK tables disagree at record {i}")));
            }

            let name = name_from_field(source.slice(record, NAME_SIZE)?);
            if name.is_empty() {
                debug!("Dropping PCK record {} with empty name", i);
                continue;
            }
            if u64::from(offset) < index_end {
                debug!("Dropping PCK record {}: data inside the index", i);
                continue;
            }
            match Entry::checked(name, u64::from(offset), u64::from(size), source) {
                Some(entry) => entries.push(entry),
                None => debug!("Dropping PCK record {}: outside the archive", i),
            }
        }
        Ok(Directory::plain(entries))
    }

    fn open_entry(
        &self,
        source: &ByteSource,
        _state: &FormatState,
        entry: &Entry,
    ) -> Result<Vec<u8>> {
        source.read_at(entry.offset, entry.size as usize)
    }
}
