use tracing::debug;
use crate::codec::value::Value;
use crate::core::connection::ConnectionManager;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{IndexDescriptor, ItemPointer, RowKey};
use crate::engine::EngineConnection;
use crate::engine::types::{ObjectId, TableKey};
use crate::schema::mapper::{column_object_name, lookup_key_table};

/// Applies row inserts and deletes to the backing tables of an index.
///
/// The caller holds the index's exclusive lock. Each call is one write
/// scope, so the change is on disk when it returns.
pub struct MutationBridge<'a> {
    conn: &'a ConnectionManager,
}

impl<'a> MutationBridge<'a> {
    pub fn new(conn: &'a ConnectionManager) -> Self {
        MutationBridge { conn }
    }

    /// Stores one row. `values` holds one entry per attribute; `None` is a
    /// null and leaves the column without a value.
    pub fn insert(&self, index: &IndexDescriptor, ctid: ItemPointer, values: &[Option<Value>]) -> Result<()> {
        let scope = self.conn.begin_write()?;
        self.conn.with_engine(|engine| {
            let table = lookup_key_table(engine, index)?;
            insert_row(engine, index, table, ctid, values)
        })?;
        scope.commit()
    }

    /// Removes one row. A row that is already gone is not an error.
    pub fn delete(&self, index: &IndexDescriptor, ctid: ItemPointer) -> Result<()> {
        let scope = self.conn.begin_write()?;
        self.conn.with_engine(|engine| {
            let table = lookup_key_table(engine, index)?;
            delete_row(engine, table, ctid)
        })?;
        scope.commit()
    }
}

pub(crate) fn insert_row(
    engine: &mut dyn EngineConnection,
    index: &IndexDescriptor,
    table: ObjectId,
    ctid: ItemPointer,
    values: &[Option<Value>],
) -> Result<()> {
    if values.len() != index.attributes.len() {
        return Err(Error::new(
            ErrorKind::InvalidArgument,
            format!("index {} has {} attributes, got {} values", index.name, index.attributes.len(), values.len()),
        ));
    }

    let key = RowKey::encode(ctid);
    let (record, _) = engine.table_add(table, TableKey::Int(key.value()))?;

    for (attribute, value) in index.attributes.iter().zip(values) {
        let Some(value) = value else {
            continue;
        };
        let column_name = column_object_name(index, &attribute.name);
        let column = engine.get(&column_name).ok_or_else(|| Error::new(
            ErrorKind::SchemaNotFound,
            format!("column \"{}\" not found", column_name),
        ))?;
        engine.set_value(column, record, attribute.kind.encode(value)?)?;
    }
    Ok(())
}

pub(crate) fn delete_row(engine: &mut dyn EngineConnection, table: ObjectId, ctid: ItemPointer) -> Result<()> {
    let key = RowKey::encode(ctid);
    match engine.table_delete(table, &TableKey::Int(key.value())) {
        Err(e) if e.is_not_found() => {
            // Concurrent deleters may have removed the key already
            debug!(ctid = %ctid, "row already deleted");
            Ok(())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::attribute::AttributeKind;
    use crate::core::config::Config;
    use crate::core::types::{AttributeDef, IndexIdentity, TableId};
    use crate::engine::types::EngineValue;
    use crate::schema::mapper::SchemaMapper;
    use tempfile::TempDir;

    fn setup() -> (TempDir, ConnectionManager, IndexDescriptor) {
        let dir = TempDir::new().unwrap();
        let conn = ConnectionManager::open_or_create(Config::with_data_dir(dir.path())).unwrap();
        let index = IndexDescriptor::new(IndexIdentity(900), "notes_idx", TableId(1), "base/1/900")
            .add_attribute(AttributeDef::new("title", AttributeKind::Text))
            .add_attribute(AttributeDef::new("rank", AttributeKind::Int4));
        SchemaMapper::new(&conn).create(&index).unwrap();
        (dir, conn, index)
    }

    #[test]
    fn insert_skips_nulls() {
        let (_dir, conn, index) = setup();
        let bridge = MutationBridge::new(&conn);
        let ctid = ItemPointer::new(3, 7);
        bridge.insert(&index, ctid, &[Some(Value::text("hello")), None]).unwrap();

        conn.with_engine(|engine| {
            let table = engine.get("t900").unwrap();
            assert_eq!(engine.table_keys(table)?, vec![TableKey::Int(RowKey::encode(ctid).value())]);
            let title = engine.get("t900.title").unwrap();
            let rank = engine.get("t900.rank").unwrap();
            assert_eq!(engine.get_value(title, 1)?, Some(EngineValue::Text("hello".into())));
            assert_eq!(engine.get_value(rank, 1)?, None);
            Ok(())
        }).unwrap();
    }

    #[test]
    fn delete_tolerates_missing_rows() {
        let (_dir, conn, index) = setup();
        let bridge = MutationBridge::new(&conn);
        let ctid = ItemPointer::new(0, 1);
        bridge.insert(&index, ctid, &[Some(Value::text("a")), Some(Value::Int4(1))]).unwrap();
        bridge.delete(&index, ctid).unwrap();
        bridge.delete(&index, ctid).unwrap();
        assert_eq!(conn.with_engine(|e| e.table_size(e.get("t900").unwrap())).unwrap(), 0);
    }

    #[test]
    fn changes_are_on_disk_when_the_call_returns() {
        let (dir, conn, index) = setup();
        let other = ConnectionManager::open_or_create(Config::with_data_dir(dir.path())).unwrap();
        let size = |conn: &ConnectionManager| {
            let _scope = conn.begin_read().unwrap();
            conn.with_engine(|e| e.table_size(e.get("t900").unwrap())).unwrap()
        };

        MutationBridge::new(&conn).insert(&index, ItemPointer::new(0, 1), &[None, Some(Value::Int4(5))]).unwrap();
        assert_eq!(size(&other), 1);

        MutationBridge::new(&other).delete(&index, ItemPointer::new(0, 1)).unwrap();
        assert_eq!(size(&conn), 0);
    }

    #[test]
    fn missing_schema_is_fatal() {
        let (_dir, conn, index) = setup();
        SchemaMapper::new(&conn).drop(&index).unwrap();
        let err = MutationBridge::new(&conn)
            .insert(&index, ItemPointer::new(0, 1), &[None, None])
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::SchemaNotFound);
    }

    #[test]
    fn value_count_must_match() {
        let (_dir, conn, index) = setup();
        let err = MutationBridge::new(&conn)
            .insert(&index, ItemPointer::new(0, 1), &[None])
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
    }
}
