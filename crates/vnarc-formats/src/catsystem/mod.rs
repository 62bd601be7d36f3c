//! CatSystem2 engine
//!
//! - [`IntOpener`]: `KIF` INT archives, optionally Blowfish-encrypted
//! - [`hg3`]: HG-3 images

pub mod hg3;
mod int;

pub use int::{IntOpener, KEY_ENTRY_NAME};
