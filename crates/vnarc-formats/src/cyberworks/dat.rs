//! Numbered data archives and their shared TOC
//!
//! The TOC starts with two 8-digit base-40 numbers, the packed and unpacked
//! length of the LZSS-packed record table that follows. Each record names
//! the archive number it lives in, so one TOC serves the whole series.

use tracing::{debug, trace};
use vnarc_crypto::substitution::decode_base40;

use crate::archive::{ArchiveCodec, Directory, FormatState, OpenContext};
use crate::codec::Input;
use crate::codec::lzss::{self, LzssConfig};
use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::scheme::AImageScheme;
use crate::source::ByteSource;

const LENGTH_DIGITS: usize = 8;
/// Record bytes after the length word
const MIN_RECORD_LEN: u32 = 19;
const FLAG_PACKED: u8 = 1;

/// Split a file name of the form `<prefix>0<n><ext>`
///
/// Returns the prefix, the digit `n` and the extension including its dot.
///
/// ```
/// use vnarc_formats::cyberworks::split_archive_name;
///
/// assert_eq!(split_archive_name("Arc02.dat"), Some(("Arc", 2, ".dat")));
/// assert_eq!(split_archive_name("data05"), Some(("data", 5, "")));
/// assert_eq!(split_archive_name("data15.dat"), None);
/// ```
pub fn split_archive_name(name: &str) -> Option<(&str, u8, &str)> {
    let (stem, ext) = name.rfind('.').map_or((name, ""), |dot| name.split_at(dot));
    let bytes = stem.as_bytes();
    let n = bytes.len();
    if n < 2 || bytes[n - 2] != b'0' || !bytes[n - 1].is_ascii_digit() {
        return None;
    }
    Some((&stem[..n - 2], bytes[n - 1] - b'0', ext))
}

const fn lzss_config(scheme: &AImageScheme) -> LzssConfig {
    if scheme.bell {
        LzssConfig::TINKERBELL
    } else {
        LzssConfig::DEFAULT
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TocRecord {
    id: u32,
    unpacked: u32,
    size: u32,
    offset: u32,
    kind: u8,
    archive: u8,
    flags: u8,
}

impl TocRecord {
    fn extension(&self) -> &'static str {
        match self.kind {
            b'a' | b'b' => "aimg",
            b'c' => "txt",
            b'd' => "ogg",
            _ => "bin",
        }
    }
}

fn parse_records(index: &[u8]) -> Option<Vec<TocRecord>> {
    let mut input = Input::new(index);
    let mut records = Vec::new();
    while input.position() < index.len() {
        let len = input.u32_le()?;
        if len < MIN_RECORD_LEN {
            return None;
        }
        let mut record = Input::new(input.take(len as usize)?);
        records.push(TocRecord {
            id: record.u32_le()?,
            unpacked: record.u32_le()?,
            size: record.u32_le()?,
            offset: record.u32_le()?,
            kind: record.u8()?,
            archive: record.u8()?,
            flags: record.u8()?,
        });
    }
    Some(records)
}

/// Unpack and parse a TOC, `None` when it does not decode under `scheme`
fn read_toc(toc: &ByteSource, scheme: &AImageScheme) -> Option<Vec<TocRecord>> {
    let lengths = toc.slice(0, 2 * LENGTH_DIGITS).ok()?;
    let packed_len = decode_base40(&lengths[..LENGTH_DIGITS])? as usize;
    let unpacked_len = decode_base40(&lengths[LENGTH_DIGITS..])? as usize;
    let packed = toc.slice(2 * LENGTH_DIGITS as u64, packed_len).ok()?;
    let index = lzss::unpack(packed, unpacked_len, lzss_config(scheme)).ok()?;
    parse_records(&index)
}

/// Cyberworks numbered data archive
#[derive(Debug, Clone, Copy, Default)]
pub struct DatOpener;

impl ArchiveCodec for DatOpener {
    fn tag(&self) -> &'static str {
        "Cyberworks/DAT"
    }

    fn probe(&self, _source: &ByteSource, ctx: &OpenContext<'_>) -> bool {
        split_archive_name(ctx.file_name()).is_some_and(|(_, n, _)| n >= 2)
    }

    fn parse_index(&self, source: &ByteSource, ctx: &OpenContext<'_>) -> Result<Directory> {
        let (prefix, number, ext) = split_archive_name(ctx.file_name())
            .filter(|&(_, n, _)| n >= 2)
            .ok_or_else(|| Error::mismatch("not a numbered Cyberworks archive"))?;
        let toc_name = format!("{prefix}01{ext}");
        let toc = ctx
            .companion(&toc_name)
            .ok_or_else(|| Error::mismatch(format!("TOC {toc_name} not found")))?;

        let schemes: Vec<AImageScheme> =
            match ctx.title.and_then(|t| ctx.registry.cyberworks_scheme(t)) {
                Some(scheme) => vec![*scheme],
                None => ctx.registry.cyberworks_schemes().map(|(_, s)| *s).collect(),
            };
        if schemes.is_empty() {
            return Err(Error::MissingKey(format!("{}: AImage scheme", ctx.archive_name)));
        }

        for scheme in schemes {
            let Some(records) = read_toc(&toc, &scheme) else {
                trace!("TOC {} does not decode with bell={}", toc_name, scheme.bell);
                continue;
            };
            let wanted = b'0' + number;
            let mut entries = Vec::new();
            for record in records.iter().filter(|r| r.archive == wanted) {
                let name = format!("{:05}.{}", record.id, record.extension());
                let Some(entry) = Entry::checked(
                    name,
                    u64::from(record.offset),
                    u64::from(record.size),
                    source,
                ) else {
                    debug!("Dropping TOC record {}: outside the archive", record.id);
                    continue;
                };
                entries.push(if record.flags & FLAG_PACKED != 0 {
                    entry.packed(u64::from(record.unpacked))
                } else {
                    entry
                });
            }
            debug!(
                "TOC {} lists {} of {} records for archive {}",
                toc_name,
                entries.len(),
                records.len(),
                number
            );
            return Ok(Directory {
                entries,
                state: FormatState::Cyberworks {
                    scheme,
                    archive_number: number,
                },
            });
        }
        Err(Error::mismatch(format!("TOC {toc_name} matches no scheme")))
    }

    fn open_entry(
        &self,
        source: &ByteSource,
        state: &FormatState,
        entry: &Entry,
    ) -> Result<Vec<u8>> {
        let data = source.read_at(entry.offset, entry.size as usize)?;
        if !entry.is_packed {
            return Ok(data);
        }
        let config = match state {
            FormatState::Cyberworks { scheme, .. } => lzss_config(scheme),
            _ => LzssConfig::DEFAULT,
        };
        let unpacked = entry.unpacked_size.unwrap_or_default() as usize;
        Ok(lzss::unpack(&data, unpacked, config)?)
    }
}
