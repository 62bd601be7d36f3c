//! Azurite `.arc` archives
//!
//! There is no signature: the file opens with the index size and the index
//! itself, whose names are stored with a position-dependent shift. Sizes and
//! offsets are big-endian.

use tracing::debug;
use vnarc_crypto::substitution::azurite_decipher_name;

use crate::archive::{ArchiveCodec, Directory, FormatState, OpenContext};
use crate::codec::Input;
use crate::codec::lzss::{self, LzssConfig};
use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::source::ByteSource;
use crate::util::decode_cp932;

/// Smallest index: one record with a one-byte name
const MIN_INDEX_SIZE: u32 = 1 + 1 + 12;

/// Silky's Azurite archive
#[derive(Debug, Clone, Copy, Default)]
pub struct ArcOpener;

impl ArchiveCodec for ArcOpener {
    fn tag(&self) -> &'static str {
        "Silky/ARC"
    }

    fn probe(&self, source: &ByteSource, ctx: &OpenContext<'_>) -> bool {
        if ctx.extension().as_deref() != Some("arc") {
            return false;
        }
        source
            .read_u32_le(0)
            .is_ok_and(|size| size >= MIN_INDEX_SIZE && 4 + u64::from(size) <= source.len())
    }

    fn parse_index(&self, source: &ByteSource, _ctx: &OpenContext<'_>) -> Result<Directory> {
        let index_size = source.read_u32_le(0)?;
        let index_end = 4 + u64::from(index_size);
        let index = source
            .slice(4, index_size as usize)
            .map_err(|_| Error::mismatch("Azurite index exceeds the file"))?;

        let mut input = Input::new(index);
        let mut entries = Vec::new();
        while input.position() < index.len() {
            let record = input.u8().and_then(|name_len| {
                let name = input.take(usize::from(name_len))?;
                let packed = input.take(4)?;
                let unpacked = input.take(4)?;
                let offset = input.take(4)?;
                Some((name, be32(packed), be32(unpacked), be32(offset)))
            });
            let Some((raw_name, packed, unpacked, offset)) = record else {
                return Err(Error::mismatch("Azurite index record overruns the index"));
            };

            let mut name = raw_name.to_vec();
            azurite_decipher_name(&mut name);
            let name = decode_cp932(&name).into_owned();
            if name.is_empty() {
                debug!("Dropping Azurite entry at {:#x}: empty name", offset);
                continue;
            }
            if u64::from(offset) < index_end {
                debug!("Dropping Azurite entry {}: data inside the index", name);
                continue;
            }
            let Some(entry) = Entry::checked(name, u64::from(offset), u64::from(packed), source)
            else {
                debug!("Dropping Azurite entry at {:#x}+{:#x}: outside the archive", offset, packed);
                continue;
            };
            entries.push(if packed == unpacked {
                entry
            } else {
                entry.packed(u64::from(unpacked))
            });
        }

        if entries.is_empty() {
            return Err(Error::mismatch("Azurite index lists no usable entries"));
        }
        Ok(Directory::plain(entries))
    }

    fn open_entry(
        &self,
        source: &ByteSource,
        _state: &FormatState,
        entry: &Entry,
    ) -> Result<Vec<u8>> {
        let data = source.slice(entry.offset, entry.size as usize)?;
        match entry.unpacked_size {
            Some(unpacked) if entry.is_packed => {
                Ok(lzss::unpack(data, unpacked as usize, LzssConfig::DEFAULT)?)
            }
            _ => Ok(data.to_vec()),
        }
    }
}

fn be32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0, |acc, &b| acc << 8 | u32::from(b))
}
