//! Circus engine
//!
//! Containers are PCK (two agreeing offset tables) and DAT (fixed-width
//! names with implied sizes). Images are CRXG, differential CRXD, and the
//! older CPS.

pub mod cps;
pub mod crx;
pub mod crxd;
mod dat;
mod pck;

pub use dat::DatOpener;
pub use pck::PckOpener;
