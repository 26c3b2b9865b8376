use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use serde::{Serialize, Deserialize};
use crate::analysis::tokenizer::TokenizerKind;
use crate::core::error::{Error, ErrorKind, Result};
use crate::engine::types::{EngineType, KeyOrganization, ObjectId};

/// Definition of one named engine object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDef {
    pub id: ObjectId,
    pub name: String,
    /// Segment location relative to the data directory; `None` keeps the
    /// object in memory only.
    pub path: Option<PathBuf>,
    pub kind: ObjectKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ObjectKind {
    Table {
        organization: KeyOrganization,
        key_type: EngineType,
        normalize: bool,
        default_tokenizer: Option<TokenizerKind>,
    },
    ScalarColumn {
        table: ObjectId,
        value_type: EngineType,
    },
    IndexColumn {
        lexicon: ObjectId,
        source_table: ObjectId,
        /// Source columns; a column's section is its 1-based position here.
        sources: Vec<ObjectId>,
        with_position: bool,
        with_section: bool,
    },
}

impl ObjectDef {
    pub fn is_table(&self) -> bool {
        matches!(self.kind, ObjectKind::Table { .. })
    }

    /// Table that owns this column, or the object itself for a table.
    pub fn owner(&self) -> ObjectId {
        match &self.kind {
            ObjectKind::Table { .. } => self.id,
            ObjectKind::ScalarColumn { table, .. } => *table,
            ObjectKind::IndexColumn { lexicon, .. } => *lexicon,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            ObjectKind::Table { organization: KeyOrganization::Hash, .. } => "TABLE_HASH_KEY",
            ObjectKind::Table { organization: KeyOrganization::PatriciaTrie, .. } => "TABLE_PAT_KEY",
            ObjectKind::ScalarColumn { .. } => "COLUMN_SCALAR",
            ObjectKind::IndexColumn { .. } => "COLUMN_INDEX",
        }
    }

    /// Flag list in the form `table_list` reports it.
    pub fn flags(&self) -> String {
        let mut flags = vec![self.type_name()];
        if self.path.is_some() {
            flags.push("PERSISTENT");
        }
        match &self.kind {
            ObjectKind::Table { normalize: true, .. } => flags.push("KEY_NORMALIZE"),
            ObjectKind::IndexColumn { with_position, with_section, .. } => {
                if *with_position {
                    flags.push("WITH_POSITION");
                }
                if *with_section {
                    flags.push("WITH_SECTION");
                }
            }
            _ => {}
        }
        flags.join("|")
    }
}

/// Definition of a table to create
#[derive(Debug, Clone)]
pub struct TableSpec {
    pub name: String,
    pub path: Option<PathBuf>,
    pub organization: KeyOrganization,
    pub key_type: EngineType,
    pub normalize: bool,
    pub default_tokenizer: Option<TokenizerKind>,
}

impl TableSpec {
    pub fn hash(name: &str, key_type: EngineType) -> Self {
        TableSpec {
            name: name.to_string(),
            path: None,
            organization: KeyOrganization::Hash,
            key_type,
            normalize: false,
            default_tokenizer: None,
        }
    }

    pub fn patricia(name: &str, key_type: EngineType) -> Self {
        TableSpec {
            organization: KeyOrganization::PatriciaTrie,
            ..TableSpec::hash(name, key_type)
        }
    }

    pub fn persistent(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn normalized(mut self) -> Self {
        self.normalize = true;
        self
    }

    pub fn with_tokenizer(mut self, tokenizer: TokenizerKind) -> Self {
        self.default_tokenizer = Some(tokenizer);
        self
    }
}

/// Definition of a scalar column to create
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub table: ObjectId,
    pub name: String,
    pub path: Option<PathBuf>,
    pub value_type: EngineType,
}

impl ColumnSpec {
    pub fn new(table: ObjectId, name: &str, value_type: EngineType) -> Self {
        ColumnSpec {
            table,
            name: name.to_string(),
            path: None,
            value_type,
        }
    }

    pub fn persistent(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// Definition of an index column to create on a lexicon table
#[derive(Debug, Clone)]
pub struct IndexColumnSpec {
    pub lexicon: ObjectId,
    pub name: String,
    pub path: Option<PathBuf>,
    pub source_table: ObjectId,
    pub with_position: bool,
    pub with_section: bool,
}

impl IndexColumnSpec {
    pub fn new(lexicon: ObjectId, name: &str, source_table: ObjectId) -> Self {
        IndexColumnSpec {
            lexicon,
            name: name.to_string(),
            path: None,
            source_table,
            with_position: true,
            with_section: true,
        }
    }

    pub fn persistent(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// Named objects of one engine database
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    /// Bumped on every sync that writes something; sessions compare it to
    /// notice changes made by other processes.
    pub generation: u64,
    pub next_id: ObjectId,
    pub objects: BTreeMap<ObjectId, ObjectDef>,
    #[serde(skip)]
    names: HashMap<String, ObjectId>,
}

impl Catalog {
    /// Ids below this are reserved for builtin types.
    const FIRST_ID: ObjectId = 256;

    pub fn new() -> Self {
        Catalog {
            generation: 0,
            next_id: Self::FIRST_ID,
            objects: BTreeMap::new(),
            names: HashMap::new(),
        }
    }

    /// Rebuilds the name lookup after deserialization.
    pub fn reindex(&mut self) {
        self.names = self.objects.values()
            .map(|def| (def.name.clone(), def.id))
            .collect();
    }

    pub fn lookup(&self, name: &str) -> Option<ObjectId> {
        self.names.get(name).copied()
    }

    pub fn get(&self, id: ObjectId) -> Result<&ObjectDef> {
        self.objects.get(&id).ok_or_else(|| Error::new(
            ErrorKind::NotFound,
            format!("no object with id {}", id),
        ))
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Result<&mut ObjectDef> {
        self.objects.get_mut(&id).ok_or_else(|| Error::new(
            ErrorKind::NotFound,
            format!("no object with id {}", id),
        ))
    }

    pub fn insert(&mut self, name: String, path: Option<PathBuf>, kind: ObjectKind) -> Result<ObjectId> {
        if self.names.contains_key(&name) {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("object already exists: {}", name),
            ));
        }

        let id = self.next_id;
        self.next_id += 1;
        self.names.insert(name.clone(), id);
        self.objects.insert(id, ObjectDef { id, name, path, kind });
        Ok(id)
    }

    pub fn remove(&mut self, id: ObjectId) -> Option<ObjectDef> {
        let def = self.objects.remove(&id)?;
        self.names.remove(&def.name);
        Some(def)
    }

    pub fn tables(&self) -> impl Iterator<Item = &ObjectDef> {
        self.objects.values().filter(|def| def.is_table())
    }

    /// Columns owned by a table, scalar and index alike.
    pub fn columns_of(&self, table: ObjectId) -> Vec<ObjectId> {
        self.objects.values()
            .filter(|def| !def.is_table() && def.owner() == table)
            .map(|def| def.id)
            .collect()
    }

    /// Index columns listing `column` as a source, with its section number.
    pub fn indexes_on(&self, column: ObjectId) -> Vec<(ObjectId, u32)> {
        self.objects.values()
            .filter_map(|def| match &def.kind {
                ObjectKind::IndexColumn { sources, .. } => sources.iter()
                    .position(|s| *s == column)
                    .map(|pos| (def.id, pos as u32 + 1)),
                _ => None,
            })
            .collect()
    }

    /// Tokenizer of the lexicon an index column belongs to.
    pub fn tokenizer_of(&self, index_column: ObjectId) -> TokenizerKind {
        self.objects.get(&index_column)
            .and_then(|def| self.objects.get(&def.owner()))
            .and_then(|lexicon| match lexicon.kind {
                ObjectKind::Table { default_tokenizer, .. } => default_tokenizer,
                _ => None,
            })
            .unwrap_or(TokenizerKind::Bigram)
    }

    /// Short name of a column (`t1.title` → `title`).
    pub fn short_name(name: &str) -> &str {
        name.rsplit_once('.').map_or(name, |(_, short)| short)
    }

    pub fn column_name(table: &str, column: &str) -> String {
        format!("{}.{}", table, column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Catalog, ObjectId, ObjectId, ObjectId) {
        let mut catalog = Catalog::new();
        let table = catalog.insert("t1".into(), None, ObjectKind::Table {
            organization: KeyOrganization::Hash,
            key_type: EngineType::Int64,
            normalize: false,
            default_tokenizer: None,
        }).unwrap();
        let column = catalog.insert("t1.title".into(), None, ObjectKind::ScalarColumn {
            table,
            value_type: EngineType::ShortText,
        }).unwrap();
        let index = catalog.insert("i1.ref".into(), None, ObjectKind::IndexColumn {
            lexicon: 999,
            source_table: table,
            sources: vec![column],
            with_position: true,
            with_section: true,
        }).unwrap();
        (catalog, table, column, index)
    }

    #[test]
    fn names_are_unique() {
        let (mut catalog, table, _, _) = sample();
        assert_eq!(catalog.lookup("t1"), Some(table));
        let dup = catalog.insert("t1".into(), None, ObjectKind::ScalarColumn {
            table,
            value_type: EngineType::Bool,
        });
        assert_eq!(dup.unwrap_err().kind, ErrorKind::InvalidArgument);
    }

    #[test]
    fn index_sources_give_sections() {
        let (catalog, table, column, index) = sample();
        assert_eq!(catalog.indexes_on(column), vec![(index, 1)]);
        assert_eq!(catalog.columns_of(table), vec![column]);
        assert_eq!(Catalog::short_name("t1.title"), "title");
    }

    #[test]
    fn reindex_restores_names() {
        let (catalog, table, _, _) = sample();
        let bytes = bincode::serialize(&catalog).unwrap();
        let mut restored: Catalog = bincode::deserialize(&bytes).unwrap();
        assert_eq!(restored.lookup("t1"), None);
        restored.reindex();
        assert_eq!(restored.lookup("t1"), Some(table));
    }
}
