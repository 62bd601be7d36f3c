//! Directory entries

use crate::source::ByteSource;

/// Broad content class of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EntryKind {
    /// Anything without a more specific class
    #[default]
    Generic,
    /// Picture data
    Image,
    /// Sound or music
    Audio,
    /// Engine script
    Script,
}

impl EntryKind {
    /// Guess the kind from a file name extension
    pub fn from_name(name: &str) -> Self {
        let ext = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "cpb" | "typ" | "hg3" | "crx" | "cps" | "aimg" | "iar" | "grd" | "igf" | "akb"
            | "msk" | "pgd" | "pic" | "bmp" | "png" | "tga" | "jpg" => Self::Image,
            "ogg" | "wav" | "mp3" | "rha" | "ogv" => Self::Audio,
            "asb" | "cst" | "txt" | "scr" | "sdt" | "fes" => Self::Script,
            _ => Self::Generic,
        }
    }
}

/// One file inside an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Path inside the archive
    pub name: String,
    /// Content class
    pub kind: EntryKind,
    /// Absolute offset of the stored data
    pub offset: u64,
    /// Stored size in bytes
    pub size: u64,
    /// Size after decompression, when known
    pub unpacked_size: Option<u64>,
    /// Stored data is compressed
    pub is_packed: bool,
}

impl Entry {
    /// Unpacked entry with a kind guessed from its name
    pub fn new(name: impl Into<String>, offset: u64, size: u64) -> Self {
        let name = name.into();
        Self {
            kind: EntryKind::from_name(&name),
            name,
            offset,
            size,
            unpacked_size: None,
            is_packed: false,
        }
    }

    /// Build an entry only if it lies inside `source`
    pub fn checked(
        name: impl Into<String>,
        offset: u64,
        size: u64,
        source: &ByteSource,
    ) -> Option<Self> {
        source
            .check_placement(offset, size)
            .then(|| Self::new(name, offset, size))
    }

    /// Override the guessed kind
    #[must_use]
    pub fn with_kind(mut self, kind: EntryKind) -> Self {
        self.kind = kind;
        self
    }

    /// Mark as compressed with a known unpacked size
    #[must_use]
    pub fn packed(mut self, unpacked_size: u64) -> Self {
        self.is_packed = true;
        self.unpacked_size = Some(unpacked_size);
        self
    }

    /// Record the unpacked size without marking the entry packed
    #[must_use]
    pub fn with_unpacked_size(mut self, unpacked_size: u64) -> Self {
        self.unpacked_size = Some(unpacked_size);
        self
    }

    /// Exclusive end offset
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.size)
    }

    /// Lower-case extension without the dot
    pub fn extension(&self) -> Option<String> {
        self.name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
    }
}
