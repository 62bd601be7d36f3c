//! Softpal engine
//!
//! PAC archives in the Amuse Craft and classic layouts, PGD images in the
//! GE, 11_C and 00_C flavors, and block-coded PIC images.

mod pac;
pub mod pgd;
pub mod pic;

pub use pac::{PacOpener, decrypt_script};
