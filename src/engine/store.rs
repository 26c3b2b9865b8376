use std::collections::{BTreeMap, HashMap};
use serde::{Serialize, Deserialize};
use crate::core::error::{Error, ErrorKind, Result};
use crate::engine::catalog::{Catalog, ObjectKind};
use crate::engine::types::{EngineValue, ObjectId, RecordId, TableKey, NIL_RECORD};
use crate::index::inverted::InvertedIndex;

/// Records of one table: key ↔ record id
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableData {
    pub next_record: RecordId,
    pub keys: BTreeMap<TableKey, RecordId>,
    pub records: BTreeMap<RecordId, TableKey>,
}

impl TableData {
    pub fn new() -> Self {
        TableData {
            next_record: NIL_RECORD + 1,
            keys: BTreeMap::new(),
            records: BTreeMap::new(),
        }
    }

    /// Returns the record of `key`, adding it when absent. The flag tells
    /// whether the record is new.
    pub fn add(&mut self, key: TableKey) -> Result<(RecordId, bool)> {
        if let Some(&record) = self.keys.get(&key) {
            return Ok((record, false));
        }
        if self.next_record == RecordId::MAX {
            return Err(Error::new(ErrorKind::Internal, "table is full".to_string()));
        }

        let record = self.next_record;
        self.next_record += 1;
        self.keys.insert(key.clone(), record);
        self.records.insert(record, key);
        Ok((record, true))
    }

    pub fn delete(&mut self, key: &TableKey) -> Option<RecordId> {
        let record = self.keys.remove(key)?;
        self.records.remove(&record);
        Some(record)
    }

    pub fn lookup(&self, key: &TableKey) -> Option<RecordId> {
        self.keys.get(key).copied()
    }

    pub fn key(&self, record: RecordId) -> Option<&TableKey> {
        self.records.get(&record)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Values of one scalar column; a missing record means no value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnData {
    pub values: BTreeMap<RecordId, EngineValue>,
}

/// Persisted state of one engine object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ObjectData {
    Table(TableData),
    Column(ColumnData),
    Index(InvertedIndex),
}

impl ObjectData {
    pub fn as_table(&self) -> Result<&TableData> {
        match self {
            ObjectData::Table(table) => Ok(table),
            _ => Err(wrong_kind("table")),
        }
    }

    pub fn as_table_mut(&mut self) -> Result<&mut TableData> {
        match self {
            ObjectData::Table(table) => Ok(table),
            _ => Err(wrong_kind("table")),
        }
    }

    pub fn as_column(&self) -> Result<&ColumnData> {
        match self {
            ObjectData::Column(column) => Ok(column),
            _ => Err(wrong_kind("column")),
        }
    }

    pub fn as_column_mut(&mut self) -> Result<&mut ColumnData> {
        match self {
            ObjectData::Column(column) => Ok(column),
            _ => Err(wrong_kind("column")),
        }
    }

    pub fn as_index(&self) -> Result<&InvertedIndex> {
        match self {
            ObjectData::Index(index) => Ok(index),
            _ => Err(wrong_kind("index column")),
        }
    }

    pub fn as_index_mut(&mut self) -> Result<&mut InvertedIndex> {
        match self {
            ObjectData::Index(index) => Ok(index),
            _ => Err(wrong_kind("index column")),
        }
    }

    /// Empty state for a freshly created object of `kind`.
    pub fn empty(kind: &ObjectKind) -> Self {
        match kind {
            ObjectKind::Table { .. } => ObjectData::Table(TableData::new()),
            ObjectKind::ScalarColumn { .. } => ObjectData::Column(ColumnData::default()),
            ObjectKind::IndexColumn { .. } => ObjectData::Index(InvertedIndex::new()),
        }
    }
}

/// Catalog plus the state of every object in it
#[derive(Debug, Default)]
pub struct Database {
    pub catalog: Catalog,
    pub objects: HashMap<ObjectId, ObjectData>,
}

impl Database {
    pub fn new() -> Self {
        Database {
            catalog: Catalog::new(),
            objects: HashMap::new(),
        }
    }

    pub fn data(&self, id: ObjectId) -> Result<&ObjectData> {
        self.objects.get(&id).ok_or_else(|| missing(id))
    }

    pub fn data_mut(&mut self, id: ObjectId) -> Result<&mut ObjectData> {
        self.objects.get_mut(&id).ok_or_else(|| missing(id))
    }

    pub fn table(&self, id: ObjectId) -> Result<&TableData> {
        self.data(id)?.as_table()
    }

    pub fn table_mut(&mut self, id: ObjectId) -> Result<&mut TableData> {
        self.data_mut(id)?.as_table_mut()
    }

    pub fn column(&self, id: ObjectId) -> Result<&ColumnData> {
        self.data(id)?.as_column()
    }

    pub fn column_mut(&mut self, id: ObjectId) -> Result<&mut ColumnData> {
        self.data_mut(id)?.as_column_mut()
    }

    pub fn index(&self, id: ObjectId) -> Result<&InvertedIndex> {
        self.data(id)?.as_index()
    }

    pub fn index_mut(&mut self, id: ObjectId) -> Result<&mut InvertedIndex> {
        self.data_mut(id)?.as_index_mut()
    }
}

fn missing(id: ObjectId) -> Error {
    Error::new(ErrorKind::NotFound, format!("no data for object {}", id))
}

fn wrong_kind(expected: &str) -> Error {
    Error::new(ErrorKind::InvalidArgument, format!("object is not a {}", expected))
}
