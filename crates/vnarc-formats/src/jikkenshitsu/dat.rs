//! `SJDAT` archives
//!
//! Header: signature, `count` at 8, CRC-32 of the plain index at 0xC. The
//! index of `count` 0x20-byte records (`name[0x18], offset, size`) starts
//! at 0x10. No key is stored, so every registry key is tried until one
//! yields an index with the right checksum.

use tracing::{debug, trace};
use vnarc_crypto::{SjTransform, crc32};

use crate::archive::{ArchiveCodec, Directory, FormatState, OpenContext};
use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::source::ByteSource;
use crate::util::{is_sane_count, name_from_field};

/// Archive signature
pub const SIGNATURE: &[u8; 8] = b"SJDAT\0\0\0";

const INDEX_OFFSET: u64 = 0x10;
const RECORD_SIZE: usize = 0x20;
const NAME_SIZE: usize = 0x18;

/// Studio Jikkenshitsu DAT archive
#[derive(Debug, Clone, Copy, Default)]
pub struct DatOpener;

impl DatOpener {
    /// Registry keys, the title's own key first
    fn candidate_keys<'a>(ctx: &OpenContext<'a>) -> Vec<(&'a str, &'a [u8])> {
        let mut keys: Vec<_> = ctx.registry.sj_keys().collect();
        if let Some(title) = ctx.title {
            keys.sort_by_key(|(name, _)| *name != title);
        }
        keys
    }
}

impl ArchiveCodec for DatOpener {
    fn tag(&self) -> &'static str {
        "Jikkenshitsu/DAT"
    }

    fn probe(&self, source: &ByteSource, _ctx: &OpenContext<'_>) -> bool {
        source.has_signature(0, SIGNATURE)
    }

    fn parse_index(&self, source: &ByteSource, ctx: &OpenContext<'_>) -> Result<Directory> {
        if !source.has_signature(0, SIGNATURE) {
            return Err(Error::mismatch("missing SJDAT signature"));
        }
        let count = source.read_u32_le(8)?;
        if !is_sane_count(count) {
            return Err(Error::corrupt_index(format!("SJDAT entry count {count}")));
        }
        let checksum = source.read_u32_le(0xC)?;
        let index_len = count as usize * RECORD_SIZE;
        let stored = source
            .slice(INDEX_OFFSET, index_len)
            .map_err(|_| Error::corrupt_index("SJDAT index exceeds the file"))?;

        let keys = Self::candidate_keys(ctx);
        if keys.is_empty() {
            return Err(Error::MissingKey(format!("{}: SJDAT key", ctx.archive_name)));
        }

        let mut found = None;
        for (title, key) in keys {
            let cipher = match SjTransform::new(key) {
                Ok(cipher) => cipher,
                Err(e) => {
                    debug!("Skipping SJDAT key for {}: {}", title, e);
                    continue;
                }
            };
            let mut index = stored.to_vec();
            cipher.decrypt(&mut index);
            if crc32(&index) == checksum {
                debug!("SJDAT index of {} decrypted with the key for {}", ctx.archive_name, title);
                found = Some((cipher, index));
                break;
            }
            trace!("SJDAT key for {} failed the index checksum", title);
        }
        let Some((cipher, index)) = found else {
            return Err(Error::UnknownEncryptionScheme(format!(
                "{}: no SJDAT key matches the index checksum",
                ctx.archive_name
            )));
        };

        let index_end = INDEX_OFFSET + index_len as u64;
        let mut entries = Vec::with_capacity(count as usize);
        for (i, record) in index.chunks_exact(RECORD_SIZE).enumerate() {
            let name = name_from_field(&record[..NAME_SIZE]);
            let field = |at: usize| {
                u32::from_le_bytes([record[at], record[at + 1], record[at + 2], record[at + 3]])
            };
            let (offset, size) = (u64::from(field(NAME_SIZE)), u64::from(field(NAME_SIZE + 4)));
            if name.is_empty() {
                debug!("Dropping SJDAT record {}: empty name", i);
                continue;
            }
            if offset < index_end {
                debug!("Dropping SJDAT entry {}: data inside the index", name);
                continue;
            }
            match Entry::checked(name, offset, size, source) {
                Some(entry) => entries.push(entry),
                None => debug!("Dropping SJDAT record {}: {:#x}+{:#x} outside the archive", i, offset, size),
            }
        }

        Ok(Directory {
            entries,
            state: FormatState::Jikkenshitsu {
                cipher: Some(cipher),
            },
        })
    }

    fn open_entry(
        &self,
        source: &ByteSource,
        state: &FormatState,
        entry: &Entry,
    ) -> Result<Vec<u8>> {
        let mut data = source.read_at(entry.offset, entry.size as usize)?;
        if let FormatState::Jikkenshitsu {
            cipher: Some(cipher),
        } = state
        {
            cipher.decrypt(&mut data);
        }
        Ok(data)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::archive::{Archive, ArchiveFormat};
    use crate::scheme::SchemeRegistry;
    use crate::source::NoCompanions;

    const KEY: &[u8] = b"jikken";

    fn build(key: &[u8], files: &[(&str, &[u8])]) -> Vec<u8> {
        let cipher = SjTransform::new(key).unwrap();
        let mut index = Vec::new();
        let mut offset = INDEX_OFFSET as usize + files.len() * RECORD_SIZE;
        for (name, data) in files {
            let mut field = [0u8; NAME_SIZE];
            field[..name.len()].copy_from_slice(name.as_bytes());
            index.extend_from_slice(&field);
            index.extend_from_slice(&(offset as u32).to_le_bytes());
            index.extend_from_slice(&(data.len() as u32).to_le_bytes());
            offset += data.len();
        }
        let checksum = crc32(&index);
        cipher.encrypt(&mut index);

        let mut out = SIGNATURE.to_vec();
        out.extend_from_slice(&(files.len() as u32).to_le_bytes());
        out.extend_from_slice(&checksum.to_le_bytes());
        out.extend(index);
        for (_, data) in files {
            let mut data = data.to_vec();
            cipher.encrypt(&mut data);
            out.extend(data);
        }
        out
    }

    fn open(registry: &SchemeRegistry, data: Vec<u8>) -> Result<Archive> {
        let ctx = OpenContext::new("data.dat", registry, &NoCompanions);
        Archive::open_as(ArchiveFormat::Jikkenshitsu, ByteSource::from(data), &ctx)
    }

    #[test]
    fn test_key_search() {
        let registry = SchemeRegistry::new()
            .with_sj_key("other", b"wrong key".to_vec())
            .with_sj_key("right", KEY.to_vec());
        let payload = b"sixteen byte msg and a tail";
        let archive = open(&registry, build(KEY, &[("script.bin", payload)])).unwrap();
        assert_eq!(archive.entries()[0].name, "script.bin");
        assert_eq!(archive.open_entry(&archive.entries()[0]).unwrap(), payload);
    }

    #[test]
    fn test_no_keys() {
        let err = open(&SchemeRegistry::new(), build(KEY, &[("a", b"x")])).unwrap_err();
        assert!(err.needs_key());
        assert!(matches!(err, Error::MissingKey(_)));
    }

    #[test]
    fn test_no_matching_key() {
        let registry = SchemeRegistry::new().with_sj_key("other", b"wrong key".to_vec());
        let err = open(&registry, build(KEY, &[("a", b"x")])).unwrap_err();
        assert!(matches!(err, Error::UnknownEncryptionScheme(_)));
    }

    #[test]
    fn test_title_key_tried_first() {
        let registry = SchemeRegistry::new()
            .with_sj_key("a", b"first".to_vec())
            .with_sj_key("b", KEY.to_vec());
        let ctx = OpenContext::new("data.dat", &registry, &NoCompanions).with_title("b");
        let keys = DatOpener::candidate_keys(&ctx);
        assert_eq!(keys[0].0, "b");
    }
}
