//! Embedded search engine. It speaks the textual command protocol the bridge
//! sends (`select`, `table_list`, `status`) and exposes the object API the
//! bridge uses to manage backing tables.

pub mod types;
pub mod catalog;
pub mod store;
pub mod command;
pub mod expr;
pub mod query;
pub mod filter;
pub mod executor;
pub mod local;

use crate::core::error::Result;
use crate::engine::catalog::{ColumnSpec, IndexColumnSpec, ObjectDef, TableSpec};
use crate::engine::types::{EngineValue, ObjectId, RecordId, TableKey};

pub use local::LocalEngine;

/// One piece of a streamed command output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub data: Vec<u8>,
    /// More chunks follow, of this output or of a later one.
    pub more: bool,
    /// This chunk completes one command's output.
    pub output_end: bool,
}

/// A session with a search engine database.
pub trait EngineConnection: Send {
    /// Executes a batch of newline-separated commands; their outputs are
    /// queued for [`recv`](EngineConnection::recv).
    fn send(&mut self, batch: &str) -> Result<()>;

    /// Next chunk of queued output. An empty final chunk means nothing is
    /// queued.
    fn recv(&mut self) -> Result<Chunk>;

    /// Looks an object up by its full name (`t1`, `t1.title`).
    fn get(&self, name: &str) -> Option<ObjectId>;

    fn object(&self, id: ObjectId) -> Result<ObjectDef>;

    fn table_create(&mut self, spec: TableSpec) -> Result<ObjectId>;

    fn column_create(&mut self, spec: ColumnSpec) -> Result<ObjectId>;

    fn index_column_create(&mut self, spec: IndexColumnSpec) -> Result<ObjectId>;

    /// Sets the source columns of an index column and indexes their
    /// current values.
    fn set_sources(&mut self, index_column: ObjectId, sources: &[ObjectId]) -> Result<()>;

    /// Removes an object and its segment; a table takes its columns with it.
    fn remove(&mut self, id: ObjectId) -> Result<()>;

    /// Adds `key`, or finds it. The flag tells whether it was added.
    fn table_add(&mut self, table: ObjectId, key: TableKey) -> Result<(RecordId, bool)>;

    /// Deletes `key` and its column values. Fails with `NotFound` when the
    /// key is absent.
    fn table_delete(&mut self, table: ObjectId, key: &TableKey) -> Result<()>;

    fn set_value(&mut self, column: ObjectId, record: RecordId, value: EngineValue) -> Result<()>;

    fn get_value(&self, column: ObjectId, record: RecordId) -> Result<Option<EngineValue>>;

    fn table_size(&self, table: ObjectId) -> Result<usize>;

    /// Snapshot of a table's keys in record order.
    fn table_keys(&self, table: ObjectId) -> Result<Vec<TableKey>>;

    fn table_names(&self) -> Vec<String>;

    /// Writes modified objects to their segments.
    fn sync(&mut self) -> Result<()>;

    /// Reloads the database when another session changed it on disk since
    /// it was loaded. Returns whether anything was reloaded.
    fn refresh(&mut self) -> Result<bool> {
        Ok(false)
    }

    fn close(&mut self) -> Result<()>;
}
