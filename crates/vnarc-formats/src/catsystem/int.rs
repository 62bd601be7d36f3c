//! `KIF` INT archives
//!
//! Records start at 8 and hold a fixed-width name, offset and size. An
//! archive whose first record is `__key__.dat` is encrypted: the record's
//! size field seeds the Blowfish key, every later record's offset and size
//! form one encrypted block, and names go through the CatSystem2 letter
//! substitution keyed by the game passphrase.

use tracing::{debug, trace};
use vnarc_crypto::substitution::catsystem_decipher_name;
use vnarc_crypto::{IntCipher, Mt19937, crc32_normal_key};

use crate::archive::{ArchiveCodec, Directory, FormatState, OpenContext};
use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::source::ByteSource;
use crate::util::{decode_cp932, encode_cp932, fixed_cstring, is_sane_count, name_from_field};

/// Name of the key record of encrypted archives
pub const KEY_ENTRY_NAME: &[u8] = b"__key__.dat";

const INDEX_OFFSET: u64 = 8;
const ENCRYPTED_NAME_SIZE: usize = 0x40;
const ENCRYPTED_RECORD_SIZE: u64 = ENCRYPTED_NAME_SIZE as u64 + 8;
const PLAIN_NAME_SIZES: [usize; 2] = [0x20, 0x40];

/// CatSystem2 INT archive
#[derive(Debug, Clone, Copy, Default)]
pub struct IntOpener;

impl IntOpener {
    fn is_encrypted(source: &ByteSource) -> bool {
        source
            .slice(INDEX_OFFSET, ENCRYPTED_NAME_SIZE)
            .is_ok_and(|name| fixed_cstring(name) == KEY_ENTRY_NAME)
    }

    fn parse_encrypted(
        source: &ByteSource,
        ctx: &OpenContext<'_>,
        count: u32,
    ) -> Result<Directory> {
        let passphrase = ctx
            .title
            .and_then(|title| ctx.registry.catsystem_passphrase(title))
            .ok_or_else(|| {
                Error::MissingKey(format!("{}: INT passphrase", ctx.archive_name))
            })?;
        let key = crc32_normal_key(&encode_cp932(passphrase));
        let seed = source.read_u32_le(INDEX_OFFSET + ENCRYPTED_NAME_SIZE as u64 + 4)?;
        let cipher = IntCipher::from_seed(seed)?;
        trace!("INT key {:#010x}, Blowfish seed {:#010x}", key, seed);

        let mut entries = Vec::with_capacity(count.saturating_sub(1) as usize);
        for i in 1..count {
            let record = INDEX_OFFSET + u64::from(i) * ENCRYPTED_RECORD_SIZE;
            let mut name = source
                .read_at(record, ENCRYPTED_NAME_SIZE)
                .map_err(|_| Error::corrupt_index("INT index exceeds the file"))?;
            let field = record + ENCRYPTED_NAME_SIZE as u64;
            let stored_offset = source.read_u32_le(field)?;
            let stored_size = source.read_u32_le(field + 4)?;
            let (offset, size) = cipher.decrypt_pair(stored_offset.wrapping_add(i), stored_size);

            let name_key = Mt19937::new(key.wrapping_add(i)).next_u32();
            let name = decode_cp932(catsystem_decipher_name(&mut name, name_key)).into_owned();
            if name.is_empty() {
                debug!("Dropping INT record {} with empty name", i);
                continue;
            }
            match Entry::checked(name, u64::from(offset), u64::from(size), source) {
                Some(entry) => entries.push(entry),
                None => debug!("Dropping INT record {}: {:#x}+{:#x} outside the archive", i, offset, size),
            }
        }

        Ok(Directory {
            entries,
            state: FormatState::CatSystem {
                cipher: Some(cipher),
            },
        })
    }

    /// Parse with one name width; `None` when any record does not fit
    fn parse_plain(source: &ByteSource, count: u32, name_size: usize) -> Option<Vec<Entry>> {
        let record_size = name_size as u64 + 8;
        let mut entries = Vec::with_capacity(count as usize);
        for i in 0..u64::from(count) {
            let record = INDEX_OFFSET + i * record_size;
            let name = name_from_field(source.slice(record, name_size).ok()?);
            if name.is_empty() {
                return None;
            }
            let field = record + name_size as u64;
            let offset = u64::from(source.read_u32_le(field).ok()?);
            let size = u64::from(source.read_u32_le(field + 4).ok()?);
            if offset <= field {
                return None;
            }
            entries.push(Entry::checked(name, offset, size, source)?);
        }
        Some(entries)
    }
}

impl ArchiveCodec for IntOpener {
    fn tag(&self) -> &'static str {
        "CatSystem2/INT"
    }

    fn probe(&self, source: &ByteSource, _ctx: &OpenContext<'_>) -> bool {
        source.has_signature(0, b"KIF\0")
    }

    fn parse_index(&self, source: &ByteSource, ctx: &OpenContext<'_>) -> Result<Directory> {
        let count = source.read_u32_le(4)?;
        if !is_sane_count(count) {
            return Err(Error::mismatch(format!("INT entry count {count}")));
        }

        if Self::is_encrypted(source) {
            return Self::parse_encrypted(source, ctx, count);
        }

        for name_size in PLAIN_NAME_SIZES {
            if let Some(entries) = Self::parse_plain(source, count, name_size) {
                debug!("INT names are {:#x} bytes wide", name_size);
                return Ok(Directory {
                    entries,
                    state: FormatState::CatSystem { cipher: None },
                });
            }
        }
        Err(Error::mismatch("INT records fit neither name width"))
    }

    fn open_entry(
        &self,
        source: &ByteSource,
        state: &FormatState,
        entry: &Entry,
    ) -> Result<Vec<u8>> {
        let mut data = source.read_at(entry.offset, entry.size as usize)?;
        if let FormatState::CatSystem {
            cipher: Some(cipher),
        } = state
        {
            cipher.decrypt(&mut data);
        }
        Ok(data)
    }
}
