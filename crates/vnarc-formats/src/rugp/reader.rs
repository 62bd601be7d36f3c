//! Object stream deserializer

use tracing::{debug, trace};

use super::class_name::{decode_class_name, decode_offset, decode_size};
use super::graph::{ClassKind, LoadArray, Object, ObjectData, ObjectGraph, ObjectId, ProjectInfo};
use super::{RioError, SIGNATURE};
use crate::util::decode_cp932;

/// Deepest nesting of objects and class lists
pub const MAX_DEPTH: usize = 40;

const NULL_TAG: u16 = 0;
const NEW_CLASS_TAG: u16 = 0xFFFF;
const BIG_OBJECT_TAG: u16 = 0x7FFF;
const CLASS_TAG: u16 = 0x8000;
const BIG_CLASS_TAG: u32 = 0x8000_0000;

const PROJECT_VERSIONS: std::ops::RangeInclusive<u32> = 0x20..=0x29;

/// Stream header flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RioFlags {
    /// Node coordinates are obfuscated and class lists are anonymous
    pub encrypted: bool,
    /// Class names are bit-packed
    pub scrambled: bool,
}

impl RioFlags {
    pub const fn from_bits(bits: u32) -> Self {
        Self {
            encrypted: bits & 1 != 0,
            scrambled: bits & 2 != 0,
        }
    }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    flags: RioFlags,
    load: LoadArray,
    graph: ObjectGraph,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], RioError> {
        let truncated = RioError::Truncated { offset: self.pos };
        let end = self.pos.checked_add(n).ok_or(truncated.clone())?;
        let bytes = self.data.get(self.pos..end).ok_or(truncated)?;
        self.pos = end;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8, RioError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, RioError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, RioError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn count(&mut self) -> Result<u32, RioError> {
        match self.u16()? {
            0xFFFF => self.u32(),
            n => Ok(u32::from(n)),
        }
    }

    fn string(&mut self) -> Result<String, RioError> {
        let len = match self.u8()? {
            0xFF => match self.u16()? {
                0xFFFF => self.u32()? as usize,
                n => usize::from(n),
            },
            n => usize::from(n),
        };
        Ok(decode_cp932(self.take(len)?).into_owned())
    }

    fn class_name(&mut self) -> Result<String, RioError> {
        if self.flags.scrambled {
            let len = usize::from(self.u16()?);
            decode_class_name(self.take(len)?)
        } else {
            self.string()
        }
    }

    fn set_data(&mut self, id: ObjectId, data: ObjectData) {
        if let Some(object) = self.graph.get_mut(id) {
            object.data = data;
        }
    }

    fn read_object(&mut self, depth: usize) -> Result<Option<ObjectId>, RioError> {
        if depth > MAX_DEPTH {
            return Err(RioError::RecursionLimit(MAX_DEPTH));
        }
        let class = match self.u16()? {
            NULL_TAG => return Ok(None),
            NEW_CLASS_TAG => {
                let schema = self.u16()?;
                let name = self.class_name()?;
                let class = ClassKind::from_name(&name).ok_or(RioError::UnknownClass(name))?;
                trace!("New class {} schema {}", class.name(), schema);
                self.load.push_class(class, schema);
                class
            }
            BIG_OBJECT_TAG => {
                let tag = self.u32()?;
                if tag & BIG_CLASS_TAG == 0 {
                    return self.load.resolve_object(tag).map(Some);
                }
                self.load.resolve_class(tag & !BIG_CLASS_TAG)?.0
            }
            tag if tag & CLASS_TAG != 0 => self.load.resolve_class(u32::from(tag & !CLASS_TAG))?.0,
            tag => return self.load.resolve_object(u32::from(tag)).map(Some),
        };

        let id = self.graph.add(Object::new(class));
        self.load.push_object(id);
        self.read_body(id, class, depth)?;
        Ok(Some(id))
    }

    fn read_body(&mut self, id: ObjectId, class: ClassKind, depth: usize) -> Result<(), RioError> {
        match class {
            ClassKind::ObjectArcMan => {
                let version = self.u16()?;
                let project = self.read_object(depth + 1)?;
                self.set_data(id, ObjectData::ArcMan { version, project });
                self.read_class_list(id, depth + 1)
            }
            ClassKind::Project => {
                let info = self.read_project(depth)?;
                self.set_data(id, ObjectData::Project(info));
                Ok(())
            }
            ClassKind::Stdb => {
                let count = self.count()?;
                let mut strings = Vec::new();
                for _ in 0..count {
                    strings.push(self.string()?);
                }
                self.set_data(id, ObjectData::Stdb(strings));
                Ok(())
            }
            ClassKind::OceanNode | ClassKind::ObjectOcean => self.read_node(id, depth),
        }
    }

    fn read_project(&mut self, depth: usize) -> Result<ProjectInfo, RioError> {
        let version = self.u32()?;
        if !PROJECT_VERSIONS.contains(&version) {
            return Err(RioError::UnsupportedVersion {
                class: ClassKind::Project.name(),
                version,
            });
        }
        let mut info = ProjectInfo {
            version,
            title: self.string()?,
            ..ProjectInfo::default()
        };
        if version >= 0x21 {
            info.author = Some(self.string()?);
        }
        if version >= 0x22 {
            info.flags = Some(self.u32()?);
        }
        if version >= 0x24 {
            info.screen = Some((self.u16()?, self.u16()?));
        }
        if version >= 0x26 {
            info.font = Some(self.string()?);
        }
        if version >= 0x29 {
            info.root = self.read_object(depth + 1)?;
        }
        Ok(info)
    }

    fn read_node(&mut self, id: ObjectId, depth: usize) -> Result<(), RioError> {
        let (mut offset, mut size) = (self.u32()?, self.u32()?);
        if self.flags.encrypted {
            offset = decode_offset(offset);
            size = decode_size(size);
        }
        let payload = self.read_object(depth + 1)?;
        self.set_data(
            id,
            ObjectData::Node {
                offset,
                size,
                payload,
            },
        );
        self.read_class_list(id, depth + 1)
    }

    fn read_class_list(&mut self, parent: ObjectId, depth: usize) -> Result<(), RioError> {
        if depth > MAX_DEPTH {
            return Err(RioError::RecursionLimit(MAX_DEPTH));
        }
        let class = match self.graph.get(parent) {
            Some(object) if object.class.is_node() => object.class,
            _ => ClassKind::OceanNode,
        };
        let count = self.count()?;
        for _ in 0..count {
            let child = if self.flags.encrypted {
                self.graph.add(Object::new(class))
            } else {
                let name = self.string()?;
                match self.graph.find_child(parent, &name) {
                    Some(existing) => existing,
                    None => {
                        let mut object = Object::new(class);
                        object.name = Some(name);
                        self.graph.add(object)
                    }
                }
            };
            self.graph.link(parent, child);
            self.read_node(child, depth + 1)?;
        }
        Ok(())
    }
}

/// Deserialize a `RIO\0` object stream
pub fn read_graph(data: &[u8]) -> Result<ObjectGraph, RioError> {
    if !data.starts_with(SIGNATURE) {
        return Err(RioError::BadSignature);
    }
    let mut reader = Reader {
        data,
        pos: SIGNATURE.len(),
        flags: RioFlags::default(),
        load: LoadArray::new(),
        graph: ObjectGraph::new(),
    };
    let version = reader.u32()?;
    reader.flags = RioFlags::from_bits(reader.u32()?);
    debug!("RIO stream version {} flags {:?}", version, reader.flags);

    let root = reader.read_object(0)?;
    reader.graph.set_root(root);
    debug!(
        "RIO graph: {} objects, {} load slots, {} bytes read",
        reader.graph.len(),
        reader.load.len(),
        reader.pos
    );
    Ok(reader.graph)
}
