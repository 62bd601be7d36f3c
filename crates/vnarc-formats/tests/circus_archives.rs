//! Integration tests for Circus PCK archives and differential CRXD images
//!
//! Archives are assembled in memory: a PCK directory holding a full CRXG
//! base and CRXD images that refer to it by archive offset or by name.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use vnarc_formats::archive::{Archive, ArchiveFormat, OpenContext};
use vnarc_formats::image::ChannelOrder;
use vnarc_formats::scheme::SchemeRegistry;
use vnarc_formats::source::{ByteSource, MemoryResolver, NoCompanions};
use vnarc_formats::util::MAX_ENTRY_COUNT;

const PCK_NAME_SIZE: usize = 0x38;

fn pck_index_end(count: usize) -> usize {
    4 + count * (8 + PCK_NAME_SIZE + 8)
}

/// PCK archive with each file stored after the index, in order
fn build_pck(files: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let payload: Vec<u8> = files.iter().flat_map(|(_, data)| data.iter().copied()).collect();
    let mut offset = pck_index_end(files.len()) as u32;
    let mut records = Vec::new();
    for (name, data) in files {
        records.push((*name, offset, data.len() as u32));
        offset += data.len() as u32;
    }
    build_pck_raw(&records, &payload)
}

/// PCK archive from explicit `(name, offset, size)` records and the bytes
/// following the index
fn build_pck_raw(records: &[(&str, u32, u32)], payload: &[u8]) -> Vec<u8> {
    let mut out = (records.len() as u32).to_le_bytes().to_vec();
    for (_, offset, size) in records {
        out.extend_from_slice(&offset.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
    }
    for (name, offset, size) in records {
        let mut field = [0u8; PCK_NAME_SIZE];
        field[..name.len()].copy_from_slice(name.as_bytes());
        out.extend_from_slice(&field);
        out.extend_from_slice(&offset.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
    }
    out.extend_from_slice(payload);
    out
}

/// 32-bit compression-2 CRXG with one "up" filtered row per entry of `rows`
///
/// Rows hold stored `(a, b, g, r)` quads.
fn crx_v2_32(offset_x: i16, offset_y: i16, width: u16, rows: &[&[u8]]) -> Vec<u8> {
    let mut raw = Vec::new();
    let mut above = vec![0u8; rows[0].len()];
    for row in rows {
        raw.push(1);
        raw.extend(row.iter().zip(&above).map(|(v, a)| v.wrapping_sub(*a)));
        above = row.to_vec();
    }
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&raw).unwrap();

    let mut out = b"CRXG".to_vec();
    out.extend_from_slice(&offset_x.to_le_bytes());
    out.extend_from_slice(&offset_y.to_le_bytes());
    for v in [width, rows.len() as u16, 2, 0, 1, 0] {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out.extend(encoder.finish().unwrap());
    out
}

fn crxd(base_offset: u32, base_name: &str, diff: &[u8]) -> Vec<u8> {
    let mut out = b"CRXD".to_vec();
    out.resize(0x20, 0);
    out.extend_from_slice(b"CRXJ");
    out.extend_from_slice(&base_offset.to_le_bytes());
    let mut name = [0u8; 0x18];
    name[..base_name.len()].copy_from_slice(base_name.as_bytes());
    out.extend_from_slice(&name);
    out.extend_from_slice(diff);
    out
}

/// 2x1 base, every channel 0x80
fn base_image() -> Vec<u8> {
    crx_v2_32(0, 0, 2, &[&[0x7F, 0x80, 0x80, 0x80, 0x7F, 0x80, 0x80, 0x80]])
}

/// 1x1 difference over the second base pixel, every channel 0x10
fn diff_image() -> Vec<u8> {
    crx_v2_32(1, 0, 1, &[&[0xEF, 0x10, 0x10, 0x10]])
}

const BLENDED: [u8; 8] = [0x80, 0x80, 0x80, 0x80, 0x90, 0x90, 0x90, 0x70];

fn open_pck(data: Vec<u8>) -> Archive {
    let registry = SchemeRegistry::new();
    let ctx = OpenContext::new("image.pck", &registry, &NoCompanions);
    Archive::open(ByteSource::from(data), &ctx).unwrap()
}

#[test]
fn crxd_base_by_archive_offset() {
    let base_offset = pck_index_end(2) as u32;
    let archive = open_pck(build_pck(&[
        ("base.crx", base_image()),
        ("face.crxd", crxd(base_offset, "unused", &diff_image())),
    ]));
    assert_eq!(archive.format(), ArchiveFormat::CircusPck);

    let face = archive.find("face.crxd").unwrap();
    let frame = archive.decode_image(face).unwrap();
    assert_eq!(frame.channel_order, ChannelOrder::Bgra);
    assert_eq!((frame.width, frame.height), (2, 1));
    assert_eq!(frame.pixels, BLENDED);
}

#[test]
fn crxd_base_by_name() {
    let archive = open_pck(build_pck(&[
        ("face.crxd", crxd(0, "base", &diff_image())),
        ("base.crx", base_image()),
    ]));
    let face = archive.find("face.crxd").unwrap();
    assert_eq!(archive.decode_image(face).unwrap().pixels, BLENDED);
}

#[test]
fn crxd_base_from_companion() {
    let archive = open_pck(build_pck(&[("face.crxd", crxd(0, "base", &diff_image()))]));
    let face = archive.find("face.crxd").unwrap();

    assert!(archive.decode_image(face).is_err());

    let companions = MemoryResolver::new().with("base.crx", base_image());
    let frame = archive.decode_image_with(face, &companions).unwrap();
    assert_eq!(frame.pixels, BLENDED);
}

#[test]
fn crx_entry_decodes_directly() {
    let archive = open_pck(build_pck(&[("base.crx", base_image())]));
    let base = archive.find("base.crx").unwrap();
    assert_eq!(archive.decode_image(base).unwrap().pixels, [0x80; 8]);
}

proptest! {
    #[test]
    fn pck_entries_stay_inside_the_source(
        records in prop::collection::vec((any::<u32>(), 0u32..0x400), 1..6),
        tail in 0usize..0x400,
    ) {
        let names: Vec<String> = (0..records.len()).map(|i| format!("f{i}")).collect();
        let records: Vec<(&str, u32, u32)> = names
            .iter()
            .zip(&records)
            .map(|(name, &(offset, size))| (name.as_str(), offset, size))
            .collect();
        let raw = build_pck_raw(&records, &vec![0xAB; tail]);
        let len = raw.len() as u64;
        let index_end = pck_index_end(records.len()) as u64;

        let registry = SchemeRegistry::new();
        let ctx = OpenContext::new("prop.pck", &registry, &NoCompanions);
        match Archive::open_as(ArchiveFormat::CircusPck, ByteSource::from(raw), &ctx) {
            Ok(archive) => {
                for entry in archive.entries() {
                    prop_assert!(entry.offset >= index_end);
                    prop_assert!(entry.end() <= len);
                }
            }
            Err(e) => prop_assert!(e.is_mismatch()),
        }
    }

    #[test]
    fn insane_counts_are_declined(
        count in prop_oneof![Just(0u32), (MAX_ENTRY_COUNT + 1)..=u32::MAX],
    ) {
        let mut data = count.to_le_bytes().to_vec();
        data.resize(0x100, 0);
        let registry = SchemeRegistry::new();
        let ctx = OpenContext::new("count.pck", &registry, &NoCompanions);
        let err = Archive::open(ByteSource::from(data), &ctx).unwrap_err();
        prop_assert!(err.is_mismatch());
    }
}
