//! Plain and encrypted ARC openers

use tracing::{debug, trace, warn};
use vnarc_crypto::{AzIsaacKeystream, crc32, xor_rotate};

use super::asb;
use super::content_key::content_key_from_sysenv;
use super::header::{ArcHeader, HEADER_SIZE, RECORD_SIZE};
use crate::archive::{ArchiveCodec, AzContent, Directory, FormatState, OpenContext};
use crate::codec;
use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::scheme::AzScheme;
use crate::source::ByteSource;
use crate::util::name_from_field;

/// Name of the archive that carries the content key seed
const SYSTEM_ARCHIVE: &str = "system.arc";

/// Entry whose payload seeds the content key
const SYSENV_ENTRY: &str = "sysenv.tbl";

/// Build entries from an unpacked index
fn read_records(index: &[u8], header: &ArcHeader, source: &ByteSource) -> Vec<Entry> {
    let base = header.data_base();
    let mut entries = Vec::with_capacity(header.count as usize);
    for record in index.chunks_exact(RECORD_SIZE) {
        let offset = u32::from_le_bytes([record[0], record[1], record[2], record[3]]);
        let size = u32::from_le_bytes([record[4], record[5], record[6], record[7]]);
        let name = name_from_field(&record[0xC..0x2C]);
        if name.is_empty() {
            debug!("Dropping ARC record with empty name at {:#x}", offset);
            continue;
        }
        match Entry::checked(name, base + u64::from(offset), u64::from(size), source) {
            Some(entry) => entries.push(entry),
            None => debug!(
                "Dropping ARC record at {:#x}+{:#x}: outside the archive",
                offset, size
            ),
        }
    }
    entries
}

/// Decrypt and unpack the index with `index_key`
///
/// `None` means the key does not fit this archive.
fn read_encrypted_index(source: &ByteSource, index_key: u32) -> Result<Option<Vec<Entry>>> {
    let mut header_bytes = source.read_at(0, HEADER_SIZE)?;
    xor_rotate::decrypt(&mut header_bytes, 0, index_key);
    let Ok(header) = ArcHeader::parse(&header_bytes) else {
        return Ok(None);
    };
    let packed_len = header.packed_index_len as usize;
    if !source.check_placement(HEADER_SIZE as u64, packed_len as u64) {
        return Ok(None);
    }

    let mut packed = source.read_at(HEADER_SIZE as u64, packed_len)?;
    xor_rotate::decrypt(&mut packed, HEADER_SIZE as u64, index_key);
    if crc32(&packed) != header.index_crc {
        trace!("Index CRC mismatch with key {:#010x}", index_key);
        return Ok(None);
    }

    let index = codec::azsys::unpack(&packed, header.index_len as usize)
        .map_err(|e| Error::corrupt_index(format!("ARC index: {e}")))?;
    Ok(Some(read_records(&index, &header, source)))
}

/// Plain `ARC\x1A` archive
#[derive(Debug, Clone, Copy, Default)]
pub struct ArcOpener;

impl ArchiveCodec for ArcOpener {
    fn tag(&self) -> &'static str {
        "AZ/ARC"
    }

    fn probe(&self, source: &ByteSource, _ctx: &OpenContext<'_>) -> bool {
        source.has_signature(0, b"ARC\x1A")
    }

    fn parse_index(&self, source: &ByteSource, ctx: &OpenContext<'_>) -> Result<Directory> {
        let header = ArcHeader::parse(source.slice(0, HEADER_SIZE)?)?;
        let packed = source
            .slice(HEADER_SIZE as u64, header.packed_index_len as usize)
            .map_err(|_| Error::mismatch("ARC packed index exceeds the file"))?;
        if crc32(packed) != header.index_crc {
            return Err(Error::mismatch("ARC index CRC mismatch"));
        }

        let index = codec::azsys::unpack(packed, header.index_len as usize)
            .map_err(|e| Error::corrupt_index(format!("ARC index: {e}")))?;
        let entries = read_records(&index, &header, source);

        let script_key = ctx
            .title
            .and_then(|title| ctx.registry.az_scheme(title))
            .and_then(|scheme| scheme.script_key);
        Ok(Directory {
            entries,
            state: FormatState::AzPlain { script_key },
        })
    }

    fn open_entry(
        &self,
        source: &ByteSource,
        state: &FormatState,
        entry: &Entry,
    ) -> Result<Vec<u8>> {
        let data = source.read_at(entry.offset, entry.size as usize)?;
        if !asb::is_asb(&data) {
            return Ok(data);
        }
        match state {
            FormatState::AzPlain {
                script_key: Some(key),
            } => asb::decode(&data, *key),
            _ => Err(Error::MissingKey(format!("script key for {}", entry.name))),
        }
    }
}

/// ARC archive with an XOR-rotate encrypted header, index and entries
#[derive(Debug, Clone, Copy, Default)]
pub struct EncryptedArcOpener;

impl EncryptedArcOpener {
    /// Registry schemes with the title's own scheme first
    fn candidates<'a>(ctx: &OpenContext<'a>) -> Vec<(&'a str, &'a AzScheme)> {
        let mut schemes: Vec<_> = ctx.registry.az_schemes().collect();
        if let Some(title) = ctx.title {
            schemes.sort_by_key(|(t, _)| *t != title);
        }
        schemes
    }

    fn content_key(
        source: &ByteSource,
        entries: &[Entry],
        ctx: &OpenContext<'_>,
        index_key: u32,
    ) -> Result<u32> {
        let is_system = ctx.file_name().eq_ignore_ascii_case(SYSTEM_ARCHIVE);
        let sysenv = if is_system {
            entries
                .iter()
                .find(|e| e.name.eq_ignore_ascii_case(SYSENV_ENTRY))
                .map(|e| (source.clone(), e.clone()))
        } else {
            ctx.companion(SYSTEM_ARCHIVE).and_then(|system| {
                let entries = read_encrypted_index(&system, index_key).ok().flatten()?;
                let entry = entries
                    .into_iter()
                    .find(|e| e.name.eq_ignore_ascii_case(SYSENV_ENTRY))?;
                Some((system, entry))
            })
        };

        match sysenv {
            Some((system, entry)) => {
                let mut data = system.read_at(entry.offset, entry.size as usize)?;
                xor_rotate::decrypt(&mut data, entry.offset, index_key);
                content_key_from_sysenv(&data)
            }
            None => {
                debug!("No {} found; content key defaults to the index key", SYSENV_ENTRY);
                Ok(index_key)
            }
        }
    }
}

impl ArchiveCodec for EncryptedArcOpener {
    fn tag(&self) -> &'static str {
        "AZ/ARC-encrypted"
    }

    fn probe(&self, source: &ByteSource, ctx: &OpenContext<'_>) -> bool {
        ctx.extension().as_deref() == Some("arc") && source.len() >= HEADER_SIZE as u64
    }

    fn parse_index(&self, source: &ByteSource, ctx: &OpenContext<'_>) -> Result<Directory> {
        let candidates = Self::candidates(ctx);
        if candidates.is_empty() {
            return Err(Error::MissingKey(format!(
                "{}: no AZ schemes in the registry",
                ctx.archive_name
            )));
        }

        for (title, scheme) in candidates {
            trace!("Trying AZ scheme {}", title);
            let Some(entries) = read_encrypted_index(source, scheme.index_key)? else {
                continue;
            };
            let key = match scheme.content_key {
                Some(key) => key,
                None => Self::content_key(source, &entries, ctx, scheme.index_key)?,
            };
            debug!("{} matched AZ scheme {}", ctx.archive_name, title);
            let content = if scheme.isaac {
                AzContent::Isaac(key)
            } else {
                AzContent::XorRotate(key)
            };
            return Ok(Directory {
                entries,
                state: FormatState::AzEncrypted {
                    index_key: scheme.index_key,
                    content,
                },
            });
        }

        warn!("No AZ scheme decrypts {}", ctx.archive_name);
        Err(Error::UnknownEncryptionScheme(ctx.archive_name.to_string()))
    }

    fn open_entry(
        &self,
        source: &ByteSource,
        state: &FormatState,
        entry: &Entry,
    ) -> Result<Vec<u8>> {
        let mut data = source.read_at(entry.offset, entry.size as usize)?;
        match state {
            FormatState::AzEncrypted {
                content: AzContent::XorRotate(key),
                ..
            } => xor_rotate::decrypt(&mut data, entry.offset, *key),
            FormatState::AzEncrypted {
                content: AzContent::Isaac(key),
                ..
            } => AzIsaacKeystream::new(*key).apply(&mut data, 0),
            _ => return Err(Error::MissingKey(format!("content key for {}", entry.name))),
        }
        Ok(data)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use crate::azsys::header::header_bytes;
    use crate::codec::azsys::pack_literals;
    use crate::scheme::SchemeRegistry;
    use crate::source::{MemoryResolver, NoCompanions};

    /// Build a plain ARC holding `files`
    pub(crate) fn build_arc(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut index = Vec::new();
        let mut data = Vec::new();
        for (name, body) in files {
            index.extend_from_slice(&(data.len() as u32).to_le_bytes());
            index.extend_from_slice(&(body.len() as u32).to_le_bytes());
            index.extend_from_slice(&crc32(body).to_le_bytes());
            let mut field = [0u8; 0x20];
            field[..name.len()].copy_from_slice(name.as_bytes());
            index.extend_from_slice(&field);
            data.extend_from_slice(body);
        }
        let packed = pack_literals(&index);
        let mut out = header_bytes(files.len() as u32, &packed);
        out.extend_from_slice(&packed);
        out.extend_from_slice(&data);
        out
    }

    /// Encrypt a plain ARC: header and index with `index_key`, entries with
    /// XOR-rotate under `content_key` at their file offsets
    pub(crate) fn encrypt_arc(plain: &[u8], index_key: u32, content_key: u32) -> Vec<u8> {
        let header = ArcHeader::parse(plain).unwrap();
        let data_base = header.data_base() as usize;
        let mut out = plain.to_vec();
        xor_rotate::decrypt(&mut out[HEADER_SIZE..data_base], HEADER_SIZE as u64, index_key);
        xor_rotate::decrypt(&mut out[..HEADER_SIZE], 0, index_key);
        xor_rotate::decrypt(&mut out[data_base..], data_base as u64, content_key);
        out
    }

    fn ctx<'a>(name: &'a str, registry: &'a SchemeRegistry) -> OpenContext<'a> {
        OpenContext::new(name, registry, &NoCompanions)
    }

    #[test]
    fn test_plain_arc() {
        let bytes = build_arc(&[("a.txt", b"alpha"), ("b.cpb", b"beta!")]);
        let source = ByteSource::from(bytes);
        let registry = SchemeRegistry::new();
        let ctx = ctx("data.arc", &registry);

        assert!(ArcOpener.probe(&source, &ctx));
        let dir = ArcOpener.parse_index(&source, &ctx).unwrap();
        assert_eq!(dir.entries.len(), 2);
        assert_eq!(dir.entries[1].name, "b.cpb");
        assert_eq!(
            ArcOpener
                .open_entry(&source, &dir.state, &dir.entries[0])
                .unwrap(),
            b"alpha"
        );
    }

    #[test]
    fn test_plain_arc_index_crc_declines() {
        let mut bytes = build_arc(&[("a.txt", b"alpha")]);
        bytes[0x14] ^= 1;
        let source = ByteSource::from(bytes);
        let registry = SchemeRegistry::new();
        let err = ArcOpener
            .parse_index(&source, &ctx("data.arc", &registry))
            .unwrap_err();
        assert!(err.is_mismatch());
    }

    #[test]
    fn test_plain_arc_drops_misplaced_records() {
        let mut bytes = build_arc(&[("a.txt", b"alpha"), ("b.txt", b"beta")]);
        bytes.truncate(bytes.len() - 1);
        let source = ByteSource::from(bytes);
        let registry = SchemeRegistry::new();
        let dir = ArcOpener
            .parse_index(&source, &ctx("data.arc", &registry))
            .unwrap();
        assert_eq!(dir.entries.len(), 1);
        assert_eq!(dir.entries[0].name, "a.txt");
    }

    #[test]
    fn test_encrypted_arc_scheme_trial() {
        let plain = build_arc(&[("x.dat", b"secret payload")]);
        let source = ByteSource::from(encrypt_arc(&plain, 0x1234_5678, 0x0BAD_F00D));
        let wrong = AzScheme {
            index_key: 1,
            content_key: Some(1),
            isaac: false,
            script_key: None,
        };
        let right = AzScheme {
            index_key: 0x1234_5678,
            content_key: Some(0x0BAD_F00D),
            isaac: false,
            script_key: None,
        };
        let registry = SchemeRegistry::new()
            .with_az("A wrong", wrong)
            .with_az("B right", right);
        let ctx = ctx("data.arc", &registry);

        assert!(!ArcOpener.probe(&source, &ctx));
        assert!(EncryptedArcOpener.probe(&source, &ctx));
        let dir = EncryptedArcOpener.parse_index(&source, &ctx).unwrap();
        assert_eq!(dir.entries[0].name, "x.dat");
        let data = EncryptedArcOpener
            .open_entry(&source, &dir.state, &dir.entries[0])
            .unwrap();
        assert_eq!(data, b"secret payload");
    }

    #[test]
    fn test_encrypted_arc_short_index_is_corrupt() {
        // CRC matches, but the index unpacks to 8 of 44 bytes
        let packed = pack_literals(&[0u8; 8]);
        let mut plain = header_bytes(1, &packed);
        plain.extend_from_slice(&packed);
        plain.extend_from_slice(b"data");

        let source = ByteSource::from(encrypt_arc(&plain, 0x1234_5678, 0x1234_5678));
        let scheme = AzScheme {
            index_key: 0x1234_5678,
            content_key: None,
            isaac: false,
            script_key: None,
        };
        let registry = SchemeRegistry::new().with_az("title", scheme);
        let err = EncryptedArcOpener
            .parse_index(&source, &ctx("data.arc", &registry))
            .unwrap_err();
        assert!(matches!(err, Error::CorruptIndex(_)));
        assert!(!err.is_entry_local());

        let err = ArcOpener
            .parse_index(&ByteSource::from(plain), &ctx("data.arc", &registry))
            .unwrap_err();
        assert!(matches!(err, Error::CorruptIndex(_)));
    }

    #[test]
    fn test_encrypted_arc_without_matching_scheme() {
        let plain = build_arc(&[("x.dat", b"payload")]);
        let source = ByteSource::from(encrypt_arc(&plain, 7, 7));
        let scheme = AzScheme {
            index_key: 8,
            content_key: None,
            isaac: false,
            script_key: None,
        };
        let registry = SchemeRegistry::new().with_az("other", scheme);
        let err = EncryptedArcOpener
            .parse_index(&source, &ctx("data.arc", &registry))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownEncryptionScheme(_)));

        let empty = SchemeRegistry::new();
        let err = EncryptedArcOpener
            .parse_index(&source, &ctx("data.arc", &empty))
            .unwrap_err();
        assert!(matches!(err, Error::MissingKey(_)));
    }

    #[test]
    fn test_content_key_defaults_to_index_key() {
        let plain = build_arc(&[("x.dat", b"payload")]);
        let source = ByteSource::from(encrypt_arc(&plain, 0x55, 0x55));
        let scheme = AzScheme {
            index_key: 0x55,
            content_key: None,
            isaac: false,
            script_key: None,
        };
        let registry = SchemeRegistry::new().with_az("t", scheme);
        let companions = MemoryResolver::new();
        let ctx = OpenContext::new("bg.arc", &registry, &companions);
        let dir = EncryptedArcOpener.parse_index(&source, &ctx).unwrap();
        assert!(matches!(
            dir.state,
            FormatState::AzEncrypted {
                content: AzContent::XorRotate(0x55),
                ..
            }
        ));
        assert_eq!(
            EncryptedArcOpener
                .open_entry(&source, &dir.state, &dir.entries[0])
                .unwrap(),
            b"payload"
        );
    }

    #[test]
    fn test_isaac_entries() {
        let body = b"isaac protected";
        let mut encrypted_body = body.to_vec();
        AzIsaacKeystream::new(0x4242).apply(&mut encrypted_body, 0);
        let plain = build_arc(&[("s.txt", &encrypted_body)]);
        // Entries are already encrypted; encrypt only header and index
        let source = ByteSource::from(encrypt_arc(&plain, 9, 0));
        let scheme = AzScheme {
            index_key: 9,
            content_key: Some(0x4242),
            isaac: true,
            script_key: None,
        };
        let registry = SchemeRegistry::new().with_az("t", scheme);
        let ctx = ctx("data.arc", &registry);
        let dir = EncryptedArcOpener.parse_index(&source, &ctx).unwrap();
        let data = EncryptedArcOpener
            .open_entry(&source, &dir.state, &dir.entries[0])
            .unwrap();
        assert_eq!(data, body);
    }

    #[test]
    fn test_asb_requires_script_key() {
        let script = asb::tests::build_asb(b"print", 0x99);
        let bytes = build_arc(&[("start.asb", &script)]);
        let source = ByteSource::from(bytes);

        let registry = SchemeRegistry::new();
        let ctx_plain = ctx("scr.arc", &registry);
        let dir = ArcOpener.parse_index(&source, &ctx_plain).unwrap();
        let err = ArcOpener
            .open_entry(&source, &dir.state, &dir.entries[0])
            .unwrap_err();
        assert!(matches!(err, Error::MissingKey(_)));
        assert!(err.is_entry_local());

        let scheme = AzScheme {
            index_key: 0,
            content_key: None,
            isaac: false,
            script_key: Some(0x99),
        };
        let registry = SchemeRegistry::new().with_az("Game", scheme);
        let ctx_keyed = ctx("scr.arc", &registry).with_title("Game");
        let dir = ArcOpener.parse_index(&source, &ctx_keyed).unwrap();
        assert_eq!(
            ArcOpener
                .open_entry(&source, &dir.state, &dir.entries[0])
                .unwrap(),
            b"print"
        );
    }
}
