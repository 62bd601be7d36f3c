//! `.sec5` resource name tables
//!
//! A `SEC5` file is a list of `id[4], size u32, body` sections. `RESR` maps
//! archive slots to resource names: `count`, then per record a name, a
//! type and an archive name as C strings, and the slot index.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::codec::Input;
use crate::util::{decode_cp932, split_cstring};

const SECTIONS_START: usize = 8;

fn find_section<'a>(data: &'a [u8], id: &[u8; 4]) -> Option<&'a [u8]> {
    if data.get(..4)? != b"SEC5" {
        return None;
    }
    let mut input = Input::new(data.get(SECTIONS_START..)?);
    loop {
        let section = input.take(4)?;
        let size = input.u32_le()?;
        let body = input.take(size as usize)?;
        trace!("SEC5 section {:?} ({} bytes)", String::from_utf8_lossy(section), size);
        if section == id {
            return Some(body);
        }
    }
}

/// Names of the resources stored in `archive_name`, keyed by slot index
///
/// Archive names compare case-insensitively, with or without extension.
pub fn resource_names(sec5: &[u8], archive_name: &str) -> Option<HashMap<u32, String>> {
    let body = find_section(sec5, b"RESR")?;
    let count = u32::from_le_bytes(body.get(..4)?.try_into().ok()?);
    let stem = archive_name.rsplit_once('.').map_or(archive_name, |(stem, _)| stem);

    let mut names = HashMap::new();
    let mut pos = 4;
    for _ in 0..count {
        let (name, next) = split_cstring(body, pos)?;
        let (_kind, next) = split_cstring(body, next)?;
        let (archive, next) = split_cstring(body, next)?;
        let index = u32::from_le_bytes(body.get(next..next + 4)?.try_into().ok()?);
        pos = next + 4;

        let archive = decode_cp932(archive);
        if archive.eq_ignore_ascii_case(archive_name) || archive.eq_ignore_ascii_case(stem) {
            names.insert(index, decode_cp932(name).into_owned());
        }
    }
    debug!("RESR names {} entries of {}", names.len(), archive_name);
    Some(names)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn build_sec5(records: &[(&str, &str, &str, u32)]) -> Vec<u8> {
        let mut resr = (records.len() as u32).to_le_bytes().to_vec();
        for (name, kind, archive, index) in records {
            for s in [name, kind, archive] {
                resr.extend_from_slice(s.as_bytes());
                resr.push(0);
            }
            resr.extend_from_slice(&index.to_le_bytes());
        }
        let mut out = b"SEC5".to_vec();
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(b"CODE");
        out.extend_from_slice(&3u32.to_le_bytes());
        out.extend_from_slice(b"xyz");
        out.extend_from_slice(b"RESR");
        out.extend_from_slice(&(resr.len() as u32).to_le_bytes());
        out.extend(resr);
        out
    }

    #[test]
    fn test_resource_names() {
        let sec5 = build_sec5(&[
            ("ev01", "image", "ev", 3),
            ("bg01", "image", "bg", 0),
            ("bg02", "image", "BG.IAR", 1),
        ]);
        let names = resource_names(&sec5, "bg.iar").unwrap();
        assert_eq!(names.len(), 2);
        assert_eq!(names[&0], "bg01");
        assert_eq!(names[&1], "bg02");
    }

    #[test]
    fn test_missing_section() {
        let mut sec5 = b"SEC5\x01\0\0\0".to_vec();
        sec5.extend_from_slice(b"CODE\x00\0\0\0");
        assert!(resource_names(&sec5, "bg.iar").is_none());
        assert!(resource_names(b"NOPE", "bg.iar").is_none());
    }
}
