//! Object arena and load array

use super::RioError;

/// Handle of an object in an [`ObjectGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(usize);

impl ObjectId {
    /// Position in the arena
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Closed class registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassKind {
    /// Archive manager at the root of a `.rio` stream
    ObjectArcMan,
    /// Project description
    Project,
    /// String table
    Stdb,
    /// Resource node
    OceanNode,
    /// Resource node variant used by newer archives
    ObjectOcean,
}

impl ClassKind {
    /// Look up a serialized class name
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "CObjectArcMan" => Self::ObjectArcMan,
            "CrelicUnitedGameProject" => Self::Project,
            "CStdb" => Self::Stdb,
            "COceanNode" => Self::OceanNode,
            "CObjectOcean" => Self::ObjectOcean,
            _ => return None,
        })
    }

    /// Serialized class name
    pub const fn name(self) -> &'static str {
        match self {
            Self::ObjectArcMan => "CObjectArcMan",
            Self::Project => "CrelicUnitedGameProject",
            Self::Stdb => "CStdb",
            Self::OceanNode => "COceanNode",
            Self::ObjectOcean => "CObjectOcean",
        }
    }

    /// Whether objects of this class carry a node body
    pub const fn is_node(self) -> bool {
        matches!(self, Self::OceanNode | Self::ObjectOcean)
    }
}

/// Project fields; later schema versions add the optional ones
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectInfo {
    /// Schema version, 0x20 to 0x29
    pub version: u32,
    /// Game title
    pub title: String,
    /// Author, from 0x21
    pub author: Option<String>,
    /// Project flags, from 0x22
    pub flags: Option<u32>,
    /// Screen width and height, from 0x24
    pub screen: Option<(u16, u16)>,
    /// Default font face, from 0x26
    pub font: Option<String>,
    /// Root resource node, from 0x29
    pub root: Option<ObjectId>,
}

/// Deserialized fields of an object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ObjectData {
    /// Not deserialized yet
    #[default]
    Empty,
    /// `CObjectArcMan`
    ArcMan {
        /// Schema version
        version: u16,
        /// Project object
        project: Option<ObjectId>,
    },
    /// `CrelicUnitedGameProject`
    Project(ProjectInfo),
    /// `CStdb`
    Stdb(Vec<String>),
    /// `COceanNode` / `CObjectOcean`
    Node {
        /// Data offset in the `.rio` file
        offset: u32,
        /// Data size
        size: u32,
        /// Attached object
        payload: Option<ObjectId>,
    },
}

/// One object in the arena
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object {
    /// Registered class of the object
    pub class: ClassKind,
    /// Node name; anonymous for encrypted class lists and tagged objects
    pub name: Option<String>,
    /// Node this object is listed under
    pub parent: Option<ObjectId>,
    /// Child nodes in stream order
    pub children: Vec<ObjectId>,
    /// Deserialized fields
    pub data: ObjectData,
}

impl Object {
    /// Empty object of `class`
    pub const fn new(class: ClassKind) -> Self {
        Self {
            class,
            name: None,
            parent: None,
            children: Vec::new(),
            data: ObjectData::Empty,
        }
    }

    /// Data placement of a node
    pub fn placement(&self) -> Option<(u32, u32)> {
        match self.data {
            ObjectData::Node { offset, size, .. } => Some((offset, size)),
            _ => None,
        }
    }
}

/// Arena holding every object of one stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectGraph {
    objects: Vec<Object>,
    root: Option<ObjectId>,
}

impl ObjectGraph {
    /// Empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object and return its handle
    pub fn add(&mut self, object: Object) -> ObjectId {
        self.objects.push(object);
        ObjectId(self.objects.len() - 1)
    }

    /// Object behind `id`
    pub fn get(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(id.0)
    }

    /// Mutable object behind `id`
    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        self.objects.get_mut(id.0)
    }

    /// Number of objects loaded
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// No object has been loaded
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Top-level object of the stream
    pub const fn root(&self) -> Option<ObjectId> {
        self.root
    }

    /// Replace the top-level object
    pub fn set_root(&mut self, root: Option<ObjectId>) {
        self.root = root;
    }

    /// Every object in load order
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &Object)> {
        self.objects.iter().enumerate().map(|(i, o)| (ObjectId(i), o))
    }

    /// Child of `parent` named `name`
    pub fn find_child(&self, parent: ObjectId, name: &str) -> Option<ObjectId> {
        self.get(parent)?
            .children
            .iter()
            .copied()
            .find(|&child| self.get(child).and_then(|o| o.name.as_deref()) == Some(name))
    }

    /// Attach `child` under `parent` unless it is already there
    pub fn link(&mut self, parent: ObjectId, child: ObjectId) {
        let Some(p) = self.objects.get_mut(parent.0) else {
            return;
        };
        if !p.children.contains(&child) {
            p.children.push(child);
        }
        if let Some(c) = self.objects.get_mut(child.0) {
            c.parent = Some(parent);
        }
    }

    /// Slash-separated path of node names from the outermost node down
    ///
    /// Anonymous nodes contribute their arena index; an unnamed root node
    /// contributes nothing.
    pub fn path(&self, id: ObjectId) -> String {
        let mut parts = Vec::new();
        let mut current = Some(id);
        while let Some(at) = current {
            let Some(object) = self.get(at) else { break };
            if !object.class.is_node() || parts.len() > self.objects.len() {
                break;
            }
            // unnamed top-level node
            if at != id && object.name.is_none() && object.parent.is_none() {
                break;
            }
            parts.push(
                object
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("{:05}", at.0)),
            );
            current = object.parent;
        }
        parts.reverse();
        parts.join("/")
    }
}

/// One entry of the load array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Index 0, the null reference
    Null,
    /// Index 1, reserved
    Sentinel,
    /// A class introduced with its schema number
    Class(ClassKind, u16),
    /// A loaded object
    Object(ObjectId),
}

/// Back-reference table of one deserialization run
///
/// Classes and objects are appended in stream order; tags refer to them by
/// index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadArray {
    slots: Vec<Slot>,
}

impl Default for LoadArray {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadArray {
    /// Table holding only the two reserved slots
    pub fn new() -> Self {
        Self {
            slots: vec![Slot::Null, Slot::Sentinel],
        }
    }

    /// Number of slots, including the two reserved ones
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always false once constructed
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Record a newly introduced class
    pub fn push_class(&mut self, class: ClassKind, schema: u16) {
        self.slots.push(Slot::Class(class, schema));
    }

    /// Record an object before its fields are read
    pub fn push_object(&mut self, id: ObjectId) {
        self.slots.push(Slot::Object(id));
    }

    /// Object loaded at `index`
    pub fn resolve_object(&self, index: u32) -> Result<ObjectId, RioError> {
        match self.slots.get(index as usize) {
            Some(Slot::Object(id)) => Ok(*id),
            _ => Err(RioError::BadClass(index)),
        }
    }

    /// Class introduced at `index`
    pub fn resolve_class(&self, index: u32) -> Result<(ClassKind, u16), RioError> {
        match self.slots.get(index as usize) {
            Some(Slot::Class(class, schema)) => Ok((*class, *schema)),
            _ => Err(RioError::BadClass(index)),
        }
    }
}
