//! `iar ` image archives

use binrw::BinRead;
use binrw::io::Cursor;
use tracing::debug;

use super::image;
use super::sec5::resource_names;
use crate::archive::{ArchiveCodec, Directory, FormatState, OpenContext};
use crate::entry::{Entry, EntryKind};
use crate::error::{Error, Result, header_mismatch};
use crate::source::ByteSource;
use crate::util::is_sane_count;

/// Size of the fixed header; the offset table follows
pub const HEADER_SIZE: u64 = 0x24;

/// IAR archive header
#[derive(Debug, Clone, PartialEq, Eq, BinRead)]
#[br(little)]
pub struct IarHeader {
    /// Signature, always `iar `
    #[br(assert(magic == *b"iar ", "Invalid IAR magic: {:?}", magic))]
    pub magic: [u8; 4],
    /// Major version, 1 to 4
    #[br(assert((1..=4).contains(&version), "Unsupported IAR version {}", version))]
    pub version: u16,
    /// Archive flags
    pub flags: u16,
    /// Size of each entry header
    pub header_size: u32,
    /// Size of the info block
    pub info_size: u32,
    /// Build time
    pub timestamp: u64,
    /// Unused
    pub reserved: u32,
    /// Number of offset table slots
    #[br(assert(is_sane_count(count), "IAR entry count {}", count))]
    pub count: u32,
    /// Number of stored files
    pub file_count: u32,
}

impl IarHeader {
    /// Width of each offset table slot
    pub const fn offset_width(&self) -> u64 {
        if self.version < 3 { 4 } else { 8 }
    }
}

/// Sas5 IAR archive
#[derive(Debug, Clone, Copy, Default)]
pub struct IarOpener;

impl ArchiveCodec for IarOpener {
    fn tag(&self) -> &'static str {
        "Sas5/IAR"
    }

    fn probe(&self, source: &ByteSource, _ctx: &OpenContext<'_>) -> bool {
        source.has_signature(0, b"iar ")
    }

    fn parse_index(&self, source: &ByteSource, ctx: &OpenContext<'_>) -> Result<Directory> {
        let header = IarHeader::read(&mut Cursor::new(source.as_slice())).map_err(header_mismatch)?;
        let width = header.offset_width();
        let table_end = HEADER_SIZE + u64::from(header.count) * width;
        if table_end > source.len() {
            return Err(Error::mismatch("IAR offset table exceeds the file"));
        }

        let names = ctx
            .companion(&format!("{}.sec5", ctx.base_name()))
            .and_then(|sec5| resource_names(sec5.as_slice(), ctx.file_name()))
            .unwrap_or_default();

        let header_len = image::header_len(header.version) as u64;
        let mut entries = Vec::with_capacity(header.count as usize);
        for i in 0..header.count {
            let slot = HEADER_SIZE + u64::from(i) * width;
            let offset = if width == 4 {
                u64::from(source.read_u32_le(slot)?)
            } else {
                source.read_u64_le(slot)?
            };
            if offset < table_end {
                debug!("Dropping IAR entry {}: data inside the index", i);
                continue;
            }
            let (Ok(palette_len), Ok(packed)) =
                (source.read_u32_le(offset + 8), source.read_u32_le(offset + 0xC))
            else {
                debug!("Dropping IAR entry {}: header outside the archive", i);
                continue;
            };
            let size = header_len + u64::from(palette_len) + u64::from(packed);
            let name = names
                .get(&i)
                .cloned()
                .unwrap_or_else(|| format!("{i:05}.iar"));
            match Entry::checked(name, offset, size, source) {
                Some(entry) => entries.push(entry.with_kind(EntryKind::Image)),
                None => debug!("Dropping IAR entry {}: {:#x}+{:#x} outside the archive", i, offset, size),
            }
        }

        debug!("IAR version {} with {} of {} entries", header.version, entries.len(), header.count);
        Ok(Directory {
            entries,
            state: FormatState::Sas5 {
                version: header.version,
            },
        })
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
