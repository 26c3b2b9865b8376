use tracing::{info, warn};
use crate::codec::value::Value;
use crate::core::connection::ConnectionManager;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::interrupt::Interrupt;
use crate::core::stats::{BuildResult, BulkDeleteStats};
use crate::core::types::{IndexDescriptor, ItemPointer, RowKey};
use crate::engine::EngineConnection;
use crate::engine::types::TableKey;
use crate::schema::mapper::{SchemaGuard, SchemaMapper};
use crate::storage::file_lock::LockMode;
use crate::writer::mutation::{delete_row, insert_row};

/// Builds the backing tables of `index` from every heap row.
///
/// The index's exclusive lock and one write scope are held from table
/// creation through the final sync; other sessions of the database wait
/// for the build. Rows are pulled outside the engine session, so the row
/// source may itself use the connection. A failure anywhere drops what was
/// created so far before the error is returned.
pub fn build<I>(conn: &ConnectionManager, index: &IndexDescriptor, rows: I, interrupt: &Interrupt) -> Result<BuildResult>
where
    I: IntoIterator<Item = (ItemPointer, Vec<Option<Value>>)>,
{
    if index.unique {
        return Err(Error::unsupported("unique indexes are not supported"));
    }

    // dropped last, after the lock and the scope are released
    let guard = SchemaGuard::new(conn, index);
    let _lock = conn.lock(index, LockMode::Exclusive)?;
    let scope = conn.begin_write()?;

    let table = SchemaMapper::new(conn).create_locked(index)?.key_table;
    let mut count = 0u64;
    for (ctid, values) in rows {
        interrupt.check()?;
        conn.with_engine(|engine| insert_row(engine, index, table, ctid, &values))?;
        count += 1;
    }
    scope.commit()?;

    guard.commit();
    info!(index = %index.name, rows = count, "index built");
    Ok(BuildResult {
        heap_tuples: count as f64,
        index_tuples: count as f64,
    })
}

/// Removes every row `is_dead` reports as gone from the heap.
///
/// Runs under the index's exclusive lock. When interrupted, the rows
/// removed so far stay removed and are synced.
pub fn bulk_delete<F>(
    conn: &ConnectionManager,
    index: &IndexDescriptor,
    stats: Option<BulkDeleteStats>,
    mut is_dead: F,
    interrupt: &Interrupt,
) -> Result<BulkDeleteStats>
where
    F: FnMut(ItemPointer) -> bool,
{
    let mut stats = match stats {
        Some(stats) => stats,
        None => vacuum_stats(conn, index)?,
    };

    let _lock = conn.lock(index, LockMode::Exclusive)?;
    let scope = conn.begin_write()?;
    let Some(table) = SchemaMapper::new(conn).find_key_table(index)? else {
        return Ok(stats);
    };

    let keys = conn.with_engine(|engine| engine.table_keys(table))?;
    let mut removed = 0u64;
    for key in keys {
        interrupt.check()?;

        let TableKey::Int(value) = key else {
            return Err(Error::new(
                ErrorKind::UnexpectedResult,
                format!("unexpected key {:?} in {}", key, index.identity.table_name()),
            ));
        };
        let ctid = RowKey(value).decode();
        if is_dead(ctid) {
            conn.with_engine(|engine| delete_row(engine, table, ctid))?;
            removed += 1;
        }
    }

    let remaining = conn.with_engine(|engine| engine.table_size(table))?;
    scope.commit()?;

    stats.tuples_removed = removed as f64;
    stats.num_index_tuples = remaining as f64;
    info!(index = %index.name, removed, remaining, "bulk delete finished");
    Ok(stats)
}

/// Statistics after vacuum; computed fresh unless bulk delete ran.
pub fn vacuum_cleanup(conn: &ConnectionManager, index: &IndexDescriptor, stats: Option<BulkDeleteStats>) -> Result<BulkDeleteStats> {
    match stats {
        Some(stats) => Ok(stats),
        None => vacuum_stats(conn, index),
    }
}

fn vacuum_stats(conn: &ConnectionManager, index: &IndexDescriptor) -> Result<BulkDeleteStats> {
    let _scope = conn.begin_read()?;
    let num_index_tuples = match SchemaMapper::new(conn).find_key_table(index)? {
        Some(table) => conn.with_engine(|engine| engine.table_size(table))? as f64,
        None => {
            warn!(index = %index.name, "key table missing, reporting an empty index");
            0.0
        }
    };

    Ok(BulkDeleteStats {
        // fixed; the engine does not account pages
        num_pages: 1,
        num_index_tuples,
        tuples_removed: 0.0,
    })
}
