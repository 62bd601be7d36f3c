//! rUGP (relic United Game Project) resources
//!
//! A `.rio` file starts with a serialized object graph in the MFC
//! `CArchive` style: every object is introduced by a tag that either names
//! a new class, refers to a class seen earlier, or points back at an object
//! already loaded. [`read_graph`] rebuilds that graph into an
//! [`ObjectGraph`] arena; [`RioOpener`] lists its `COceanNode` objects as
//! archive entries.

mod class_name;
mod error;
mod graph;
mod reader;
pub mod rha;
mod rio;

pub use class_name::{decode_class_name, decode_offset, decode_size};
pub use error::RioError;
pub use graph::{ClassKind, LoadArray, Object, ObjectData, ObjectGraph, ObjectId, ProjectInfo, Slot};
pub use reader::{MAX_DEPTH, RioFlags, read_graph};
pub use rio::{RioOpener, SIGNATURE};
