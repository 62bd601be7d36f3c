//! Circus DAT archives
//!
//! `count` followed by `name[N] + offset` records. Sizes are implied by the
//! next record's offset, and the last entry runs to the end of the file.
//! The name width varies between games and is found by trial.

use tracing::debug;

use crate::archive::{ArchiveCodec, Directory, FormatState, OpenContext};
use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::source::ByteSource;
use crate::util::{is_sane_count, name_from_field};

const NAME_SIZES: [usize; 3] = [0x24, 0x30, 0x3C];

/// Circus DAT archive
#[derive(Debug, Clone, Copy, Default)]
pub struct DatOpener;

impl DatOpener {
    /// Parse with one name width; `None` when the records are inconsistent
    fn try_name_size(source: &ByteSource, count: u32, name_size: usize) -> Option<Vec<Entry>> {
        let record_size = name_size as u64 + 4;
        let index_end = 4 + u64::from(count) * record_size;
        if index_end > source.len() {
            return None;
        }

        let mut records = Vec::with_capacity(count as usize);
        for i in 0..u64::from(count) {
            let record = 4 + i * record_size;
            let name = name_from_field(source.slice(record, name_size).ok()?);
            let offset = u64::from(source.read_u32_le(record + name_size as u64).ok()?);
            if name.is_empty() || offset < index_end || offset > source.len() {
                return None;
            }
            if records.last().is_some_and(|&(_, prev)| offset < prev) {
                return None;
            }
            records.push((name, offset));
        }

        let ends = records
            .iter()
            .skip(1)
            .map(|&(_, offset)| offset)
            .chain(std::iter::once(source.len()));
        let entries = records
            .iter()
            .zip(ends)
            .map(|((name, offset), end)| Entry::new(name.clone(), *offset, end - offset))
            .collect();
        Some(entries)
    }
}

impl ArchiveCodec for DatOpener {
    fn tag(&self) -> &'static str {
        "Circus/DAT"
    }

    fn probe(&self, source: &ByteSource, ctx: &OpenContext<'_>) -> bool {
        ctx.extension().as_deref() == Some("dat")
            && source.read_u32_le(0).is_ok_and(is_sane_count)
    }

    fn parse_index(&self, source: &ByteSource, _ctx: &OpenContext<'_>) -> Result<Directory> {
        let count = source.read_u32_le(0)?;
        if !is_sane_count(count) {
            return Err(Error::mismatch(format!("DAT entry count {count}")));
        }
        for name_size in NAME_SIZES {
            if let Some(entries) = Self::try_name_size(source, count, name_size) {
                debug!("Circus DAT names are {:#x} bytes wide", name_size);
                return Ok(Directory::plain(entries));
            }
        }
        Err(Error::mismatch("Circus DAT records fit no name width"))
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
