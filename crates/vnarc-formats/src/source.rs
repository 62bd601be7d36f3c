//! Random-access byte sources and companion-file resolution
//!
//! [`ByteSource`] is an immutable, cheaply clonable view over archive bytes.
//! Every read is bounds-checked and fails with [`Error::OutOfBounds`] rather
//! than truncating. File-backed sources are memory-mapped.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use memmap2::MmapOptions;
use tracing::{debug, trace};

use crate::error::{Error, Result};

/// Immutable random-access view over archive bytes
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ByteSource {
    data: Bytes,
}

impl std::fmt::Debug for ByteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteSource")
            .field("len", &self.data.len())
            .finish()
    }
}

impl From<Vec<u8>> for ByteSource {
    fn from(data: Vec<u8>) -> Self {
        Self { data: data.into() }
    }
}

impl From<&'static [u8]> for ByteSource {
    fn from(data: &'static [u8]) -> Self {
        Self {
            data: Bytes::from_static(data),
        }
    }
}

impl From<Bytes> for ByteSource {
    fn from(data: Bytes) -> Self {
        Self { data }
    }
}

impl ByteSource {
    /// Wrap owned bytes
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Memory-map a file
    pub fn open_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        if len == 0 {
            return Ok(Self::default());
        }

        // The mapping is read-only and archives are not modified while open
        #[allow(unsafe_code)]
        let mmap = unsafe { MmapOptions::new().map(&file)? };
        debug!("Mapped {} ({} bytes)", path.display(), len);
        Ok(Self {
            data: Bytes::from_owner(mmap),
        })
    }

    /// Total length in bytes
    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    /// True when the source holds no bytes
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whole source as a slice
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    fn range(&self, offset: u64, len: u64) -> Result<std::ops::Range<usize>> {
        match offset.checked_add(len) {
            Some(end) if end <= self.len() => Ok(offset as usize..end as usize),
            _ => Err(Error::OutOfBounds {
                offset,
                len,
                source_len: self.len(),
            }),
        }
    }

    /// Borrow `len` bytes at `offset`
    pub fn slice(&self, offset: u64, len: usize) -> Result<&[u8]> {
        let range = self.range(offset, len as u64)?;
        Ok(&self.data[range])
    }

    /// Copy `len` bytes at `offset`
    pub fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        self.slice(offset, len).map(<[u8]>::to_vec)
    }

    /// Zero-copy sub-range as a new source
    pub fn sub_source(&self, offset: u64, len: u64) -> Result<Self> {
        let range = self.range(offset, len)?;
        Ok(Self {
            data: self.data.slice(range),
        })
    }

    /// Bytes from `offset` to the end
    pub fn tail(&self, offset: u64) -> Result<&[u8]> {
        let len = self.len().checked_sub(offset).ok_or(Error::OutOfBounds {
            offset,
            len: 0,
            source_len: self.len(),
        })?;
        self.slice(offset, len as usize)
    }

    fn array<const N: usize>(&self, offset: u64) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.slice(offset, N)?);
        Ok(out)
    }

    /// Read one byte
    pub fn read_u8(&self, offset: u64) -> Result<u8> {
        Ok(self.array::<1>(offset)?[0])
    }

    /// Read a little-endian `u16`
    pub fn read_u16_le(&self, offset: u64) -> Result<u16> {
        self.array(offset).map(u16::from_le_bytes)
    }

    /// Read a big-endian `u16`
    pub fn read_u16_be(&self, offset: u64) -> Result<u16> {
        self.array(offset).map(u16::from_be_bytes)
    }

    /// Read a little-endian `u32`
    pub fn read_u32_le(&self, offset: u64) -> Result<u32> {
        self.array(offset).map(u32::from_le_bytes)
    }

    /// Read a big-endian `u32`
    pub fn read_u32_be(&self, offset: u64) -> Result<u32> {
        self.array(offset).map(u32::from_be_bytes)
    }

    /// Read a little-endian `i32`
    pub fn read_i32_le(&self, offset: u64) -> Result<i32> {
        self.array(offset).map(i32::from_le_bytes)
    }

    /// Read a little-endian `u64`
    pub fn read_u64_le(&self, offset: u64) -> Result<u64> {
        self.array(offset).map(u64::from_le_bytes)
    }

    /// True when `[offset, offset + size)` lies inside the source
    pub fn check_placement(&self, offset: u64, size: u64) -> bool {
        offset.checked_add(size).is_some_and(|end| end <= self.len())
    }

    /// True when the source starts with `signature` at `offset`
    pub fn has_signature(&self, offset: u64, signature: &[u8]) -> bool {
        self.slice(offset, signature.len())
            .is_ok_and(|bytes| bytes == signature)
    }
}

/// Locates sibling files an archive depends on (TOCs, name tables, indices)
pub trait CompanionResolver: Send + Sync {
    /// Open a companion by file name, `None` when it does not exist
    fn open(&self, name: &str) -> Option<ByteSource>;
}

/// Resolver for archives that have no companions
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCompanions;

impl CompanionResolver for NoCompanions {
    fn open(&self, _name: &str) -> Option<ByteSource> {
        None
    }
}

/// Resolves companions inside one directory
///
/// Names are matched exactly first and then case-insensitively, since
/// archives shipped on Windows rarely agree on case.
#[derive(Debug, Clone)]
pub struct DirectoryResolver {
    dir: PathBuf,
}

impl DirectoryResolver {
    /// Resolver rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Resolver for the directory containing `archive_path`
    pub fn for_archive(archive_path: impl AsRef<Path>) -> Self {
        let dir = archive_path
            .as_ref()
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        Self { dir }
    }

    fn find(&self, name: &str) -> Option<PathBuf> {
        let exact = self.dir.join(name);
        if exact.is_file() {
            return Some(exact);
        }
        std::fs::read_dir(&self.dir)
            .ok()?
            .filter_map(std::result::Result::ok)
            .find(|e| e.file_name().to_string_lossy().eq_ignore_ascii_case(name))
            .map(|e| e.path())
    }
}

impl CompanionResolver for DirectoryResolver {
    fn open(&self, name: &str) -> Option<ByteSource> {
        let path = self.find(name)?;
        match ByteSource::open_file(&path) {
            Ok(source) => Some(source),
            Err(e) => {
                debug!("Companion {} could not be opened: {}", path.display(), e);
                None
            }
        }
    }
}

/// In-memory companion table keyed case-insensitively
#[derive(Debug, Clone, Default)]
pub struct MemoryResolver {
    files: HashMap<String, ByteSource>,
}

impl MemoryResolver {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a companion
    pub fn insert(&mut self, name: &str, source: impl Into<ByteSource>) {
        self.files.insert(name.to_ascii_lowercase(), source.into());
    }

    /// Builder form of [`MemoryResolver::insert`]
    #[must_use]
    pub fn with(mut self, name: &str, source: impl Into<ByteSource>) -> Self {
        self.insert(name, source);
        self
    }
}

impl CompanionResolver for MemoryResolver {
    fn open(&self, name: &str) -> Option<ByteSource> {
        let found = self.files.get(&name.to_ascii_lowercase()).cloned();
        trace!("Companion lookup {}: {}", name, found.is_some());
        found
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_bounds_checked_reads() {
        let source = ByteSource::from(vec![1, 2, 3, 4, 5]);
        assert_eq!(source.read_at(1, 3).unwrap(), vec![2, 3, 4]);
        assert_eq!(source.read_at(5, 0).unwrap(), Vec::<u8>::new());
        assert!(matches!(
            source.read_at(3, 3),
            Err(Error::OutOfBounds {
                offset: 3,
                len: 3,
                source_len: 5
            })
        ));
        assert!(source.read_at(u64::MAX, 2).is_err());
    }

    #[test]
    fn test_endian_reads() {
        let source = ByteSource::from(vec![0x12, 0x34, 0x56, 0x78, 0x9A]);
        assert_eq!(source.read_u16_le(0).unwrap(), 0x3412);
        assert_eq!(source.read_u16_be(0).unwrap(), 0x1234);
        assert_eq!(source.read_u32_le(0).unwrap(), 0x7856_3412);
        assert_eq!(source.read_u32_be(1).unwrap(), 0x3456_789A);
        assert!(source.read_u32_le(2).is_err());
        assert!(source.read_u64_le(0).is_err());
    }

    #[test]
    fn test_check_placement() {
        let source = ByteSource::from(vec![0u8; 100]);
        assert!(source.check_placement(0, 100));
        assert!(source.check_placement(100, 0));
        assert!(!source.check_placement(50, 51));
        assert!(!source.check_placement(u64::MAX, 2));
    }

    #[test]
    fn test_sub_source_and_tail() {
        let source = ByteSource::from(b"headerPAYLOAD".to_vec());
        let sub = source.sub_source(6, 7).unwrap();
        assert_eq!(sub.as_slice(), b"PAYLOAD");
        assert_eq!(source.tail(6).unwrap(), b"PAYLOAD");
        assert!(source.tail(14).is_err());
        assert!(source.has_signature(0, b"head"));
        assert!(!source.has_signature(10, b"LOADX"));
    }

    #[test]
    fn test_memory_mapped_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"KIF\0mapped").unwrap();
        file.flush().unwrap();

        let source = ByteSource::open_file(file.path()).unwrap();
        assert_eq!(source.len(), 10);
        assert!(source.has_signature(0, b"KIF\0"));
    }

    #[test]
    fn test_directory_resolver_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Arc01.dat"), b"toc").unwrap();

        let resolver = DirectoryResolver::new(dir.path());
        assert_eq!(resolver.open("Arc01.dat").unwrap().as_slice(), b"toc");
        assert_eq!(resolver.open("ARC01.DAT").unwrap().as_slice(), b"toc");
        assert!(resolver.open("Arc02.dat").is_none());
    }

    #[test]
    fn test_memory_resolver() {
        let resolver = MemoryResolver::new().with("System.arc", vec![1u8, 2, 3]);
        assert_eq!(resolver.open("system.ARC").unwrap().len(), 3);
        assert!(NoCompanions.open("system.arc").is_none());
    }
}
