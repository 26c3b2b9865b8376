use tracing::debug;
use crate::core::connection::ConnectionManager;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{IndexDescriptor, ItemPointer};
use crate::query::compiler::compile;
use crate::query::types::ScanKey;
use crate::search::cursor::{Direction, ResultCursor};
use crate::search::registry::{ScanId, UnitOfWork};
use crate::storage::file_lock::LockMode;
use crate::writer::mutation::MutationBridge;

struct OpenScan {
    id: ScanId,
    cursor: ResultCursor,
}

/// One index scan as the host drives it. The engine is queried on the first
/// fetch after `begin` or `rescan`, and the result stays registered in the
/// unit of work until the scan is rescanned or ended.
pub struct IndexScan<'a> {
    conn: &'a ConnectionManager,
    index: &'a IndexDescriptor,
    keys: Vec<ScanKey>,
    open: Option<OpenScan>,
}

impl<'a> IndexScan<'a> {
    pub fn begin(conn: &'a ConnectionManager, index: &'a IndexDescriptor, keys: Vec<ScanKey>) -> Self {
        IndexScan { conn, index, keys, open: None }
    }

    pub fn keys(&self) -> &[ScanKey] {
        &self.keys
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    fn ensure_open(&mut self, uow: &mut UnitOfWork) -> Result<&mut OpenScan> {
        if self.open.is_none() {
            let command = compile(self.index, &self.keys)?;
            let cursor = {
                let _lock = if self.conn.config().lock_scans {
                    Some(self.conn.lock(self.index, LockMode::Shared)?)
                } else {
                    None
                };
                ResultCursor::open(self.conn, &command, self.index.table)?
            };

            let id = uow.register(cursor.result().clone());
            debug!(index = %self.index.name, scan = id.0, hits = cursor.result().len(), "scan opened");
            self.open = Some(OpenScan { id, cursor });
        }

        self.open.as_mut().ok_or_else(|| Error::new(ErrorKind::Internal, "scan not open".to_string()))
    }

    /// Next matching row. With `kill_prior` the host reports that the row
    /// returned last is dead; it is removed from the key table first.
    pub fn get_next_tuple(
        &mut self,
        uow: &mut UnitOfWork,
        direction: Direction,
        kill_prior: bool,
    ) -> Result<Option<ItemPointer>> {
        if direction != Direction::Forward {
            return Err(Error::unsupported("only forward scans are supported"));
        }

        let conn = self.conn;
        let index = self.index;
        let scan = self.ensure_open(uow)?;

        if kill_prior {
            let ctid = scan.cursor.last_returned().ok_or_else(|| Error::new(
                ErrorKind::InvalidState,
                "no tuple was returned before".to_string(),
            ))?;
            let _lock = conn.lock(index, LockMode::Exclusive)?;
            MutationBridge::new(conn).delete(index, ctid)?;
            debug!(index = %index.name, ctid = %ctid, "dead tuple removed");
        }

        scan.cursor.fetch_next(direction)
    }

    /// Every row not returned yet.
    pub fn get_all_matches(&mut self, uow: &mut UnitOfWork) -> Result<Vec<ItemPointer>> {
        let scan = self.ensure_open(uow)?;
        Ok(scan.cursor.fetch_remaining())
    }

    /// Drops the current result; `keys` replaces the scan keys when given.
    pub fn rescan(&mut self, uow: &mut UnitOfWork, keys: Option<Vec<ScanKey>>) {
        self.close(uow);
        if let Some(keys) = keys {
            self.keys = keys;
        }
    }

    pub fn end_scan(mut self, uow: &mut UnitOfWork) {
        self.close(uow);
    }

    fn close(&mut self, uow: &mut UnitOfWork) {
        if let Some(scan) = self.open.take() {
            uow.deregister(scan.id);
            debug!(index = %self.index.name, scan = scan.id.0, "scan closed");
        }
    }
}
