use serde::{Serialize, Deserialize};
use std::fmt;
use std::path::PathBuf;
use crate::codec::attribute::AttributeKind;

/// Physical location of a heap row: block number and 1-based line offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemPointer {
    pub block: u32,
    pub offset: u16,
}

impl ItemPointer {
    pub fn new(block: u32, offset: u16) -> Self {
        ItemPointer { block, offset }
    }
}

impl fmt::Display for ItemPointer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({},{})", self.block, self.offset)
    }
}

/// Backing-table primary key: block number in the high bits, offset in the
/// low 16 bits. Ordering matches `ItemPointer` ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowKey(pub i64);

impl RowKey {
    /// Key zero never names a row; the engine emits it for records that are
    /// being removed concurrently.
    pub const SENTINEL: RowKey = RowKey(0);

    pub fn encode(ctid: ItemPointer) -> Self {
        RowKey(((ctid.block as i64) << 16) | ctid.offset as i64)
    }

    pub fn decode(self) -> ItemPointer {
        ItemPointer {
            block: ((self.0 >> 16) & 0xFFFF_FFFF) as u32,
            offset: (self.0 & 0xFFFF) as u16,
        }
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_sentinel(&self) -> bool {
        *self == Self::SENTINEL
    }
}

impl From<ItemPointer> for RowKey {
    fn from(ctid: ItemPointer) -> Self {
        RowKey::encode(ctid)
    }
}

/// Storage identity of one relational index (its file node number).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IndexIdentity(pub u32);

impl IndexIdentity {
    pub fn table_name(&self) -> String {
        format!("t{}", self.0)
    }

    pub fn index_name(&self) -> String {
        format!("i{}", self.0)
    }

    /// Parses `t<id>` or `i<id>` back into an identity.
    pub fn from_object_name(name: &str) -> Option<Self> {
        let digits = name.strip_prefix('t').or_else(|| name.strip_prefix('i'))?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok().map(IndexIdentity)
    }
}

/// Identity of the relational table an index belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TableId(pub u32);

/// One indexed attribute as the host catalog describes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDef {
    pub name: String,
    pub kind: AttributeKind,
    /// Declared length modifier, -1 when absent.
    pub type_modifier: i32,
    /// The attribute's operator family has a containment operator.
    pub contains: bool,
}

impl AttributeDef {
    pub fn new(name: &str, kind: AttributeKind) -> Self {
        AttributeDef {
            name: name.to_string(),
            kind,
            type_modifier: -1,
            contains: kind.supports_contains(),
        }
    }

    pub fn with_type_modifier(mut self, type_modifier: i32) -> Self {
        self.type_modifier = type_modifier;
        self
    }

    pub fn with_contains(mut self, contains: bool) -> Self {
        self.contains = contains;
        self
    }
}

/// Everything the bridge needs to know about one relational index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub identity: IndexIdentity,
    pub name: String,
    pub table: TableId,
    /// Base storage path of the index, relative to the host data directory.
    pub storage_path: PathBuf,
    pub attributes: Vec<AttributeDef>,
    pub unique: bool,
}

impl IndexDescriptor {
    pub fn new(identity: IndexIdentity, name: &str, table: TableId, storage_path: impl Into<PathBuf>) -> Self {
        IndexDescriptor {
            identity,
            name: name.to_string(),
            table,
            storage_path: storage_path.into(),
            attributes: Vec::new(),
            unique: false,
        }
    }

    pub fn add_attribute(mut self, attribute: AttributeDef) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Looks up an attribute by its 1-based number.
    pub fn attribute(&self, attno: i16) -> Option<&AttributeDef> {
        if attno < 1 {
            return None;
        }
        self.attributes.get(attno as usize - 1)
    }
}
