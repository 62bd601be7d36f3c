//! Silky's engine
//!
//! Azurite `.arc` archives plus the GRD, IGF, AKB and RMSK images they
//! carry.

pub mod akb;
mod arc;
pub mod grd;
pub mod rmsk;

pub use arc::ArcOpener;
