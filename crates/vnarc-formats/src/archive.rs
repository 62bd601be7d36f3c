//! Archive probing, opening and entry access
//!
//! Every supported container has one opener type implementing
//! [`ArchiveCodec`]. [`ArchiveFormat`] is the closed set of those openers and
//! dispatches to them with a plain `match`, and [`open_archive`] walks
//! [`ArchiveFormat::ALL`] until one opener accepts the source.
//!
//! Openers decline with [`Error::FormatMismatch`]; any other error aborts
//! the open since it means the signature matched but the archive is broken
//! or locked.

use tracing::{debug, trace};
use vnarc_crypto::{IntCipher, SjTransform};

use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::image::{ImageFormat, ImageFrame};
use crate::rugp::ObjectGraph;
use crate::scheme::{AImageScheme, SchemeRegistry};
use crate::source::{ByteSource, CompanionResolver, NoCompanions};
use crate::{azsys, catsystem, circus, cyberworks, jikkenshitsu, rugp, sas5, silky, softpal};

/// Deepest chain of differential images followed when decoding
pub const MAX_IMAGE_CHAIN: usize = 8;

/// Configuration handed to every opener
#[derive(Clone, Copy)]
pub struct OpenContext<'a> {
    /// File name of the archive, used for name-driven formats and companions
    pub archive_name: &'a str,
    /// Game title selecting keys in the registry
    pub title: Option<&'a str>,
    /// Known keys and schemes
    pub registry: &'a SchemeRegistry,
    /// Sibling file lookup
    pub companions: &'a dyn CompanionResolver,
}

impl std::fmt::Debug for OpenContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenContext")
            .field("archive_name", &self.archive_name)
            .field("title", &self.title)
            .finish_non_exhaustive()
    }
}

impl<'a> OpenContext<'a> {
    /// Context without a title
    pub fn new(
        archive_name: &'a str,
        registry: &'a SchemeRegistry,
        companions: &'a dyn CompanionResolver,
    ) -> Self {
        Self {
            archive_name,
            title: None,
            registry,
            companions,
        }
    }

    /// Select the game title used for key lookups
    #[must_use]
    pub fn with_title(mut self, title: &'a str) -> Self {
        self.title = Some(title);
        self
    }

    /// Archive file name without any directory part
    pub fn file_name(&self) -> &'a str {
        self.archive_name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(self.archive_name)
    }

    /// Lower-case extension of the archive name, without the dot
    pub fn extension(&self) -> Option<String> {
        self.file_name()
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
    }

    /// Archive file name with its extension removed
    pub fn base_name(&self) -> &'a str {
        let name = self.file_name();
        name.rsplit_once('.').map_or(name, |(base, _)| base)
    }

    /// Open a sibling file
    pub fn companion(&self, name: &str) -> Option<ByteSource> {
        let found = self.companions.open(name);
        debug!(
            "Companion {} for {}: {}",
            name,
            self.archive_name,
            if found.is_some() { "found" } else { "missing" }
        );
        found
    }
}

/// Entry cipher of an encrypted AZ System archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AzContent {
    /// XOR-rotate keyed by the content key at the entry's file offset
    XorRotate(u32),
    /// ISAAC-64 keystream seeded by the content key
    Isaac(u32),
}

/// Per-archive state an opener needs to read entries later
#[derive(Debug, Clone, Default)]
pub enum FormatState {
    /// Nothing beyond the entry table
    #[default]
    None,
    /// Unencrypted AZ System archive
    AzPlain {
        /// Key of `.asb` scripts, when known
        script_key: Option<u32>,
    },
    /// Encrypted AZ System archive
    AzEncrypted {
        /// Header and index key
        index_key: u32,
        /// Entry cipher
        content: AzContent,
    },
    /// CatSystem2 INT archive
    CatSystem {
        /// Blowfish layer of encrypted archives
        cipher: Option<IntCipher>,
    },
    /// Cyberworks data archive
    Cyberworks {
        /// AImage parameters
        scheme: AImageScheme,
        /// Digit of this archive in the `<prefix>0<n>` series
        archive_number: u8,
    },
    /// Sas5 IAR archive
    Sas5 {
        /// Archive version word
        version: u16,
    },
    /// Studio Jikkenshitsu DAT archive
    Jikkenshitsu {
        /// Payload cipher
        cipher: Option<SjTransform>,
    },
    /// rUGP resource archive
    Rugp {
        /// Deserialized object graph
        graph: ObjectGraph,
    },
}

/// Result of a successful index parse
#[derive(Debug, Clone, Default)]
pub struct Directory {
    /// Entries in index order
    pub entries: Vec<Entry>,
    /// State for later entry reads
    pub state: FormatState,
}

impl Directory {
    /// Directory with no extra state
    pub fn plain(entries: Vec<Entry>) -> Self {
        Self {
            entries,
            state: FormatState::None,
        }
    }
}

/// One container format
pub trait ArchiveCodec {
    /// Short stable identifier
    fn tag(&self) -> &'static str;

    /// Cheap check of signature or name; false means skip without parsing
    fn probe(&self, source: &ByteSource, ctx: &OpenContext<'_>) -> bool;

    /// Parse the directory
    fn parse_index(&self, source: &ByteSource, ctx: &OpenContext<'_>) -> Result<Directory>;

    /// Read, decrypt and unpack one entry
    fn open_entry(
        &self,
        source: &ByteSource,
        state: &FormatState,
        entry: &Entry,
    ) -> Result<Vec<u8>>;
}

/// Supported container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    /// AZ System `ARC\x1A`
    AzArc,
    /// AZ System archive with an encrypted header
    AzEncrypted,
    /// CatSystem2 `KIF` INT
    CatSystemInt,
    /// Circus PCK
    CircusPck,
    /// Circus DAT
    CircusDat,
    /// Cyberworks / TinkerBell numbered data archive
    Cyberworks,
    /// Sas5 IAR
    Sas5Iar,
    /// Silky's Azurite ARC
    SilkyArc,
    /// Softpal PAC
    SoftpalPac,
    /// Studio Jikkenshitsu DAT
    Jikkenshitsu,
    /// rUGP RIO
    Rugp,
}

macro_rules! dispatch {
    ($format:expr, $opener:ident => $body:expr) => {
        match $format {
            ArchiveFormat::AzArc => {
                let $opener = azsys::ArcOpener;
                $body
            }
            ArchiveFormat::AzEncrypted => {
                let $opener = azsys::EncryptedArcOpener;
                $body
            }
            ArchiveFormat::CatSystemInt => {
                let $opener = catsystem::IntOpener;
                $body
            }
            ArchiveFormat::CircusPck => {
                let $opener = circus::PckOpener;
                $body
            }
            ArchiveFormat::CircusDat => {
                let $opener = circus::DatOpener;
                $body
            }
            ArchiveFormat::Cyberworks => {
                let $opener = cyberworks::DatOpener;
                $body
            }
            ArchiveFormat::Sas5Iar => {
                let $opener = sas5::IarOpener;
                $body
            }
            ArchiveFormat::SilkyArc => {
                let $opener = silky::ArcOpener;
                $body
            }
            ArchiveFormat::SoftpalPac => {
                let $opener = softpal::PacOpener;
                $body
            }
            ArchiveFormat::Jikkenshitsu => {
                let $opener = jikkenshitsu::DatOpener;
                $body
            }
            ArchiveFormat::Rugp => {
                let $opener = rugp::RioOpener;
                $body
            }
        }
    };
}

impl ArchiveFormat {
    /// Probe order: signed formats first, heuristic ones after, and the
    /// encrypted AZ archive last since it has no readable signature
    pub const ALL: [Self; 11] = [
        Self::AzArc,
        Self::CatSystemInt,
        Self::Sas5Iar,
        Self::Jikkenshitsu,
        Self::Rugp,
        Self::SoftpalPac,
        Self::Cyberworks,
        Self::CircusPck,
        Self::CircusDat,
        Self::SilkyArc,
        Self::AzEncrypted,
    ];
}

impl ArchiveCodec for ArchiveFormat {
    fn tag(&self) -> &'static str {
        dispatch!(self, opener => opener.tag())
    }

    fn probe(&self, source: &ByteSource, ctx: &OpenContext<'_>) -> bool {
        dispatch!(self, opener => opener.probe(source, ctx))
    }

    fn parse_index(&self, source: &ByteSource, ctx: &OpenContext<'_>) -> Result<Directory> {
        dispatch!(self, opener => opener.parse_index(source, ctx))
    }

    fn open_entry(
        &self,
        source: &ByteSource,
        state: &FormatState,
        entry: &Entry,
    ) -> Result<Vec<u8>> {
        dispatch!(self, opener => opener.open_entry(source, state, entry))
    }
}

/// An opened archive
#[derive(Debug, Clone)]
pub struct Archive {
    source: ByteSource,
    entries: Vec<Entry>,
    state: FormatState,
    format: ArchiveFormat,
}

impl Archive {
    /// Probe every format in [`ArchiveFormat::ALL`] order
    pub fn open(source: ByteSource, ctx: &OpenContext<'_>) -> Result<Self> {
        open_archive(source, ctx)
    }

    /// Open as one specific format
    pub fn open_as(format: ArchiveFormat, source: ByteSource, ctx: &OpenContext<'_>) -> Result<Self> {
        let Directory { entries, state } = format.parse_index(&source, ctx)?;
        debug!(
            "Opened {} as {} with {} entries",
            ctx.archive_name,
            format.tag(),
            entries.len()
        );
        Ok(Self {
            source,
            entries,
            state,
            format,
        })
    }

    /// Entries in index order
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Format that accepted the source
    pub fn format(&self) -> ArchiveFormat {
        self.format
    }

    /// Per-format state
    pub fn state(&self) -> &FormatState {
        &self.state
    }

    /// Underlying bytes
    pub fn source(&self) -> &ByteSource {
        &self.source
    }

    /// Entry with the given name, compared case-insensitively
    pub fn find(&self, name: &str) -> Option<&Entry> {
        self.entries
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
    }

    /// Entry stored at `offset`
    pub fn find_by_offset(&self, offset: u64) -> Option<&Entry> {
        self.entries.iter().find(|e| e.offset == offset)
    }

    /// Decrypted and unpacked contents of `entry`
    pub fn open_entry(&self, entry: &Entry) -> Result<Vec<u8>> {
        trace!("Reading {} ({} bytes at {:#x})", entry.name, entry.size, entry.offset);
        self.format.open_entry(&self.source, &self.state, entry)
    }

    /// Decode an image entry
    pub fn decode_image(&self, entry: &Entry) -> Result<ImageFrame> {
        self.decode_image_with(entry, &NoCompanions)
    }

    /// Decode an image entry, looking up differential bases in `companions`
    /// when the archive does not hold them
    pub fn decode_image_with(
        &self,
        entry: &Entry,
        companions: &dyn CompanionResolver,
    ) -> Result<ImageFrame> {
        self.decode_image_at_depth(entry, companions, 0)
    }

    pub(crate) fn decode_image_at_depth(
        &self,
        entry: &Entry,
        companions: &dyn CompanionResolver,
        depth: usize,
    ) -> Result<ImageFrame> {
        if depth > MAX_IMAGE_CHAIN {
            return Err(Error::CorruptData(format!(
                "{}: differential image chain deeper than {MAX_IMAGE_CHAIN}",
                entry.name
            )));
        }
        let data = self.open_entry(entry)?;

        match &self.state {
            FormatState::Cyberworks { scheme, .. } if data.first() == Some(&scheme.value3) => {
                return cyberworks::aimage::decode_entry(self, entry, &data, scheme, depth);
            }
            FormatState::Sas5 { version } => return sas5::image::decode(&data, *version),
            _ => {}
        }

        match ImageFormat::detect(&data) {
            Some(ImageFormat::Crxd) => {
                let mut resolve = |offset: u32, name: &str| -> Result<Option<Vec<u8>>> {
                    self.crxd_base(offset, name, companions)
                };
                circus::crxd::decode(&data, &mut resolve, depth)
            }
            Some(format) => decode_detected(format, &data),
            None => Err(Error::mismatch(format!("{}: not a known image", entry.name))),
        }
    }

    fn crxd_base(
        &self,
        offset: u32,
        name: &str,
        companions: &dyn CompanionResolver,
    ) -> Result<Option<Vec<u8>>> {
        if let Some(base) = self.find_by_offset(u64::from(offset)) {
            return self.open_entry(base).map(Some);
        }
        if let Some(base) = self.find(name).or_else(|| self.find(&format!("{name}.crx"))) {
            return self.open_entry(base).map(Some);
        }
        let found = companions
            .open(name)
            .or_else(|| companions.open(&format!("{name}.crx")));
        debug!("CRXD base {} via companion: {}", name, found.is_some());
        Ok(found.map(|source| source.as_slice().to_vec()))
    }
}

/// Decode a standalone image file
///
/// Differential CRXD images are only decoded when they embed a full image.
pub fn decode_image(data: &[u8]) -> Result<ImageFrame> {
    match ImageFormat::detect(data) {
        Some(ImageFormat::Crxd) => {
            let mut no_base = |_: u32, _: &str| -> Result<Option<Vec<u8>>> { Ok(None) };
            circus::crxd::decode(data, &mut no_base, 0)
        }
        Some(format) => decode_detected(format, data),
        None => Err(Error::mismatch("not a known image")),
    }
}

fn decode_detected(format: ImageFormat, data: &[u8]) -> Result<ImageFrame> {
    match format {
        ImageFormat::Cpb => azsys::cpb::decode(data),
        ImageFormat::Typ1 => azsys::typ1::decode(data),
        ImageFormat::Hg3 => catsystem::hg3::decode(data),
        ImageFormat::Crx => circus::crx::decode(data),
        ImageFormat::Crxd => Err(Error::unsupported("standalone CRXD", 0u8)),
        ImageFormat::Cps => circus::cps::decode(data),
        ImageFormat::Grd | ImageFormat::Igf => silky::grd::decode(data),
        ImageFormat::Akb => silky::akb::decode(data),
        ImageFormat::Rmsk => silky::rmsk::decode(data),
        ImageFormat::Pgd => softpal::pgd::decode(data),
        ImageFormat::Pic => softpal::pic::decode(data),
    }
}

/// Try every format until one accepts `source`
pub fn open_archive(source: ByteSource, ctx: &OpenContext<'_>) -> Result<Archive> {
    for format in ArchiveFormat::ALL {
        if !format.probe(&source, ctx) {
            continue;
        }
        match Archive::open_as(format, source.clone(), ctx) {
            Ok(archive) => return Ok(archive),
            Err(e) if e.is_mismatch() => {
                debug!("{} declined {}: {}", format.tag(), ctx.archive_name, e);
            }
            Err(e) => return Err(e),
        }
    }
    Err(Error::mismatch(format!(
        "{}: no archive format matched",
        ctx.archive_name
    )))
}
