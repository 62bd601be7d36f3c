//! `.rio` resource archives

use tracing::debug;

use super::{RioError, read_graph, rha};
use crate::archive::{ArchiveCodec, Directory, FormatState, OpenContext};
use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::source::ByteSource;

/// Object stream signature
pub const SIGNATURE: &[u8; 4] = b"RIO\0";

/// rUGP `.rio` archive
#[derive(Debug, Clone, Copy, Default)]
pub struct RioOpener;

impl ArchiveCodec for RioOpener {
    fn tag(&self) -> &'static str {
        "rUGP/RIO"
    }

    fn probe(&self, source: &ByteSource, ctx: &OpenContext<'_>) -> bool {
        source.has_signature(0, SIGNATURE) || ctx.extension().as_deref() == Some("rio")
    }

    fn parse_index(&self, source: &ByteSource, ctx: &OpenContext<'_>) -> Result<Directory> {
        let head = ctx.companion(&format!("{}.ici", ctx.base_name()));
        let stream = head.as_ref().unwrap_or(source);
        let graph = match read_graph(stream.as_slice()) {
            Ok(graph) => graph,
            Err(RioError::BadSignature) => return Err(Error::mismatch("missing RIO signature")),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for (id, object) in graph.iter() {
            let Some((offset, size)) = object.placement() else {
                continue;
            };
            if size == 0 {
                continue;
            }
            let name = graph.path(id);
            match Entry::checked(name, u64::from(offset), u64::from(size), source) {
                Some(entry) => entries.push(entry),
                None => debug!(
                    "Dropping RIO node {}: {:#x}+{:#x} outside the archive",
                    graph.path(id),
                    offset,
                    size
                ),
            }
        }
        debug!("{}: {} RIO nodes with data", ctx.archive_name, entries.len());

        Ok(Directory {
            entries,
            state: FormatState::Rugp { graph },
        })
    }

    fn open_entry(
        &self,
        source: &ByteSource,
        _state: &FormatState,
        entry: &Entry,
    ) -> Result<Vec<u8>> {
        let data = source.read_at(entry.offset, entry.size as usize)?;
        if data.starts_with(rha::SIGNATURE) {
            return rha::to_mp3(&data);
        }
        Ok(data)
    }
}
