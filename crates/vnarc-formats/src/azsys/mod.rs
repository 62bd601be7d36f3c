//! AZ System engine
//!
//! - [`ArcOpener`]: plain `ARC\x1A` archives with an AZ-packed index
//! - [`EncryptedArcOpener`]: the same layout under XOR-rotate, with keys
//!   tried from the scheme registry and entry keys derived from `sysenv.tbl`
//! - [`asb`]: packed and XOR-ed `ASB\x1A` scripts
//! - [`cpb`] and [`typ1`]: channel-planar images

mod arc;
pub mod asb;
pub mod content_key;
pub mod cpb;
mod header;
pub mod typ1;

pub use arc::{ArcOpener, EncryptedArcOpener};
pub use content_key::generate_content_key;
pub use header::{ArcHeader, HEADER_SIZE, RECORD_SIZE};
