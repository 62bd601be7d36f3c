//! Archive, codec and image parsers for visual-novel engine resources
//!
#![allow(clippy::cast_possible_truncation)] // Intentional for binary format parsing
#![allow(clippy::cast_possible_wrap)] // Intentional for binary operations
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::uninlined_format_args)] // Backwards compatibility
#![allow(clippy::doc_markdown)] // Engine names don't need backticks
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::similar_names)] // Domain-specific naming patterns
#![allow(clippy::needless_pass_by_value)] // Context types
#![allow(clippy::map_unwrap_or)] // Binary format patterns
#![allow(clippy::redundant_closure_for_method_calls)] // Iterator chains
#![allow(clippy::return_self_not_must_use)] // Builder patterns
#![allow(clippy::precedence)] // Bit packing reads better without parentheses
#![allow(clippy::many_single_char_names)] // Pixel math
//! This crate reads the resource containers of a number of Japanese
//! visual-novel engines: it lists their entries, decrypts and unpacks entry
//! data, and decodes the engine-specific image formats into top-down
//! [`image::ImageFrame`]s.
//!
//! # Supported Engines
//!
//! - **AZ System**: `ARC\x1A` archives, plain and encrypted, CPB/TYP1 images, ASB scripts
//! - **CatSystem2**: `KIF` (`.int`) archives with the Blowfish index layer, HG-3 images
//! - **Circus**: PCK and DAT archives, CRX/CRXD and CPS images
//! - **Cyberworks**: numbered `.dat` archives and their AImage pictures
//! - **Sas5**: IAR archives with `.sec5` name tables and IAR images
//! - **Silky's**: AZ-named ARC archives, GRD/IGF, AKB and RMSK images
//! - **Softpal**: PAC archives, PGD and PIC images, script decryption
//! - **Studio Jikkenshitsu**: `SJDAT` archives
//! - **rUGP**: `.rio` object graphs and RHA audio
//!
//! # Opening an archive
//!
//! Formats are probed in a fixed order until one accepts the source. Keys and
//! per-title schemes come from an immutable [`scheme::SchemeRegistry`];
//! sibling files such as `.sec5` name tables are found through a
//! [`source::CompanionResolver`].
//!
//! ```
//! use vnarc_formats::archive::{Archive, OpenContext};
//! use vnarc_formats::scheme::SchemeRegistry;
//! use vnarc_formats::source::{ByteSource, NoCompanions};
//!
//! let registry = SchemeRegistry::builtin();
//! let ctx = OpenContext::new("unknown.bin", &registry, &NoCompanions);
//! let result = Archive::open(ByteSource::from(vec![0u8; 16]), &ctx);
//! assert!(result.unwrap_err().is_mismatch());
//! ```

pub mod archive;
pub mod azsys;
pub mod bitstream;
pub mod catsystem;
pub mod circus;
pub mod codec;
pub mod cyberworks;
pub mod entry;
pub mod error;
pub mod image;
pub mod jikkenshitsu;
pub mod rugp;
pub mod sas5;
pub mod scheme;
pub mod silky;
pub mod softpal;
pub mod source;
pub mod util;

pub use archive::{Archive, ArchiveFormat, OpenContext, decode_image};
pub use entry::{Entry, EntryKind};
pub use error::{Error, Result};
pub use image::ImageFrame;
pub use source::ByteSource;
