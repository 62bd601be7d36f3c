//! Sas5 engine
//!
//! `iar ` archives hold images only; their names live in the `RESR`
//! section of the sibling `.sec5` script database.

mod iar;
pub mod image;
mod sec5;

pub use iar::{IarHeader, IarOpener};
pub use sec5::resource_names;
