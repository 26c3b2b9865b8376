use tracing::{debug, info, warn};
use crate::analysis::tokenizer::TokenizerKind;
use crate::core::connection::ConnectionManager;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::IndexDescriptor;
use crate::engine::EngineConnection;
use crate::engine::catalog::{Catalog, ColumnSpec, IndexColumnSpec, TableSpec};
use crate::engine::types::{EngineType, ObjectId};
use crate::storage::file_lock::LockMode;
use crate::storage::layout::StorageLayout;

/// Name of the index column on the inverted table.
pub const INDEX_COLUMN: &str = "ref";

/// Engine objects created for one relational index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackingTables {
    pub key_table: ObjectId,
    /// One scalar column per attribute, in attribute order.
    pub columns: Vec<ObjectId>,
    /// Inverted table and its `ref` column, when an attribute supports
    /// containment.
    pub inverted: Option<(ObjectId, ObjectId)>,
}

/// Creates and drops the backing tables of relational indexes.
pub struct SchemaMapper<'a> {
    conn: &'a ConnectionManager,
}

impl<'a> SchemaMapper<'a> {
    pub fn new(conn: &'a ConnectionManager) -> Self {
        SchemaMapper { conn }
    }

    /// Creates the key table, its columns and, when needed, the inverted
    /// table. Runs under the index's exclusive lock and syncs on success.
    pub fn create(&self, index: &IndexDescriptor) -> Result<BackingTables> {
        let _lock = self.conn.lock(index, LockMode::Exclusive)?;
        self.create_locked(index)
    }

    /// [`create`](Self::create) for a caller already holding the index's
    /// exclusive lock.
    pub(crate) fn create_locked(&self, index: &IndexDescriptor) -> Result<BackingTables> {
        let scope = self.conn.begin_write()?;
        let tables = self.conn.with_engine(|engine| create_objects(engine, index))?;
        scope.commit()?;

        info!(
            index = %index.name,
            table = %index.identity.table_name(),
            columns = tables.columns.len(),
            inverted = tables.inverted.is_some(),
            "backing tables created"
        );
        Ok(tables)
    }

    /// Removes the inverted table, then the key table. Failures are logged
    /// and never stop the second removal.
    pub fn drop(&self, index: &IndexDescriptor) -> Result<()> {
        let _lock = self.conn.lock(index, LockMode::Exclusive)?;
        let scope = self.conn.begin_write()?;
        self.conn.with_engine(|engine| {
            for name in [index.identity.index_name(), index.identity.table_name()] {
                remove_logged(engine, &name, &index.name);
            }
            Ok(())
        })?;
        if let Err(e) = scope.commit() {
            warn!(index = %index.name, error = %e, "sync after drop failed");
        }
        Ok(())
    }

    /// Key table of `index`; a missing table is `SchemaNotFound`.
    pub fn key_table(&self, index: &IndexDescriptor) -> Result<ObjectId> {
        let _scope = self.conn.begin_read()?;
        self.conn.with_engine(|engine| lookup_key_table(engine, index))
    }

    /// Key table of `index`, logging a warning when it is missing.
    pub fn find_key_table(&self, index: &IndexDescriptor) -> Result<Option<ObjectId>> {
        match self.key_table(index) {
            Ok(table) => Ok(Some(table)),
            Err(e) if e.kind == ErrorKind::SchemaNotFound => {
                warn!(index = %index.name, "{}", e.context);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

pub(crate) fn lookup_key_table(engine: &dyn EngineConnection, index: &IndexDescriptor) -> Result<ObjectId> {
    let name = index.identity.table_name();
    engine.get(&name).ok_or_else(|| {
        Error::new(ErrorKind::SchemaNotFound, format!("object \"{}\" not found", name))
    })
}

fn create_objects(engine: &mut dyn EngineConnection, index: &IndexDescriptor) -> Result<BackingTables> {
    let base = index.storage_path.as_path();

    let key_table = engine.table_create(
        TableSpec::hash(&index.identity.table_name(), EngineType::Int64)
            .persistent(StorageLayout::key_table_path(base)),
    )?;

    let mut columns = Vec::with_capacity(index.attributes.len());
    let mut text_columns = Vec::new();
    for (i, attribute) in index.attributes.iter().enumerate() {
        let value_type = attribute.kind.engine_type(attribute.type_modifier);
        let column = engine.column_create(
            ColumnSpec::new(key_table, &attribute.name, value_type)
                .persistent(StorageLayout::column_path(base, i + 1)),
        )?;
        debug!(column = %attribute.name, value_type = %value_type, "backing column created");

        if attribute.contains {
            text_columns.push(column);
        }
        columns.push(column);
    }

    let inverted = if text_columns.is_empty() {
        None
    } else {
        let lexicon = engine.table_create(
            TableSpec::patricia(&index.identity.index_name(), EngineType::ShortText)
                .persistent(StorageLayout::lexicon_path(base))
                .normalized()
                .with_tokenizer(TokenizerKind::Bigram),
        )?;
        let index_column = engine.index_column_create(
            IndexColumnSpec::new(lexicon, INDEX_COLUMN, key_table)
                .persistent(StorageLayout::index_column_path(base)),
        )?;
        engine.set_sources(index_column, &text_columns)?;
        Some((lexicon, index_column))
    };

    Ok(BackingTables { key_table, columns, inverted })
}

fn remove_logged(engine: &mut dyn EngineConnection, name: &str, index_name: &str) {
    let Some(id) = engine.get(name) else {
        warn!(index = index_name, "object \"{}\" not found", name);
        return;
    };
    if let Err(e) = engine.remove(id) {
        warn!(index = index_name, object = name, error = %e, "failed to remove backing object");
    }
}

/// Drops a partially built schema unless committed.
pub struct SchemaGuard<'a> {
    mapper: SchemaMapper<'a>,
    index: &'a IndexDescriptor,
    armed: bool,
}

impl<'a> SchemaGuard<'a> {
    pub fn new(conn: &'a ConnectionManager, index: &'a IndexDescriptor) -> Self {
        SchemaGuard {
            mapper: SchemaMapper::new(conn),
            index,
            armed: true,
        }
    }

    pub fn commit(mut self) {
        self.armed = false;
    }
}

impl Drop for SchemaGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!(index = %self.index.name, "dropping partially built backing tables");
        if let Err(e) = self.mapper.drop(self.index) {
            warn!(index = %self.index.name, error = %e, "rollback of backing tables failed");
        }
    }
}

/// Full engine name of an attribute's backing column.
pub fn column_object_name(index: &IndexDescriptor, attribute: &str) -> String {
    Catalog::column_name(&index.identity.table_name(), attribute)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::attribute::AttributeKind;
    use crate::core::config::Config;
    use crate::core::types::{AttributeDef, IndexIdentity, TableId};
    use crate::engine::catalog::ObjectKind;
    use tempfile::TempDir;

    fn descriptor() -> IndexDescriptor {
        IndexDescriptor::new(IndexIdentity(16384), "docs_idx", TableId(16380), "base/1/16384")
            .add_attribute(AttributeDef::new("id", AttributeKind::Int4))
            .add_attribute(AttributeDef::new("body", AttributeKind::Text))
    }

    #[test]
    fn creates_key_and_inverted_tables() {
        let dir = TempDir::new().unwrap();
        let conn = ConnectionManager::open_or_create(Config::with_data_dir(dir.path())).unwrap();
        let index = descriptor();

        let tables = SchemaMapper::new(&conn).create(&index).unwrap();
        assert_eq!(tables.columns.len(), 2);
        let (lexicon, ref_column) = tables.inverted.unwrap();

        conn.with_engine(|engine| {
            assert_eq!(engine.get("t16384"), Some(tables.key_table));
            assert_eq!(engine.get("t16384.body"), Some(tables.columns[1]));
            assert_eq!(engine.get("i16384"), Some(lexicon));
            match engine.object(ref_column)?.kind {
                ObjectKind::IndexColumn { sources, .. } => assert_eq!(sources, vec![tables.columns[1]]),
                other => panic!("unexpected kind {:?}", other),
            }
            Ok(())
        }).unwrap();

        assert!(dir.path().join("base/1/16384.grn").exists());
        assert!(dir.path().join("base/1/16384.grn.2").exists());
        assert!(dir.path().join("base/1/16384.grn.r").exists());
    }

    #[test]
    fn no_inverted_table_without_text() {
        let dir = TempDir::new().unwrap();
        let conn = ConnectionManager::open_or_create(Config::with_data_dir(dir.path())).unwrap();
        let index = IndexDescriptor::new(IndexIdentity(7), "ints", TableId(1), "base/1/7")
            .add_attribute(AttributeDef::new("n", AttributeKind::Int8));

        let tables = SchemaMapper::new(&conn).create(&index).unwrap();
        assert_eq!(tables.inverted, None);
        assert_eq!(conn.with_engine(|e| Ok(e.get("i7"))).unwrap(), None);
    }

    #[test]
    fn drop_removes_everything_and_tolerates_absence() {
        let dir = TempDir::new().unwrap();
        let conn = ConnectionManager::open_or_create(Config::with_data_dir(dir.path())).unwrap();
        let index = descriptor();
        let mapper = SchemaMapper::new(&conn);

        mapper.create(&index).unwrap();
        mapper.drop(&index).unwrap();
        assert_eq!(mapper.key_table(&index).unwrap_err().kind, ErrorKind::SchemaNotFound);
        assert!(!dir.path().join("base/1/16384.grn").exists());
        assert!(!dir.path().join("base/1/16384.grn.i").exists());

        // second drop only warns
        mapper.drop(&index).unwrap();
        assert_eq!(mapper.find_key_table(&index).unwrap(), None);
    }

    #[test]
    fn guard_rolls_back_unless_committed() {
        let dir = TempDir::new().unwrap();
        let conn = ConnectionManager::open_or_create(Config::with_data_dir(dir.path())).unwrap();
        let index = descriptor();

        {
            let _guard = SchemaGuard::new(&conn, &index);
            SchemaMapper::new(&conn).create(&index).unwrap();
        }
        assert_eq!(SchemaMapper::new(&conn).find_key_table(&index).unwrap(), None);

        let guard = SchemaGuard::new(&conn, &index);
        SchemaMapper::new(&conn).create(&index).unwrap();
        guard.commit();
        assert!(SchemaMapper::new(&conn).find_key_table(&index).unwrap().is_some());
        assert_eq!(column_object_name(&index, "body"), "t16384.body");
    }
}
