//! Cyberworks / TinkerBell engine
//!
//! Data lives in numbered archives `<prefix>02`, `<prefix>03`, ... whose
//! shared table of contents is the sibling `<prefix>01`. Images use the
//! AImage format of [`aimage`].

pub mod aimage;
mod dat;

pub use dat::{DatOpener, split_archive_name};
