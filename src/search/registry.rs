use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use crate::core::types::{ItemPointer, TableId};
use crate::search::cursor::ScanResult;

/// Handle of one registered scan result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScanId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionEnd {
    Commit,
    Abort,
}

/// Scan results open in the current unit of work, grouped by the table they
/// scan. Score lookups read from here after the scans hand back their rows.
#[derive(Debug, Default)]
pub struct UnitOfWork {
    next_id: u64,
    scans: HashMap<TableId, Vec<(ScanId, Arc<ScanResult>)>>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        UnitOfWork::default()
    }

    pub fn register(&mut self, result: Arc<ScanResult>) -> ScanId {
        self.next_id += 1;
        let id = ScanId(self.next_id);
        self.scans.entry(result.table).or_default().push((id, result));
        id
    }

    /// Removes a scan; false when it was not registered.
    pub fn deregister(&mut self, id: ScanId) -> bool {
        let found = self.scans.iter_mut().find_map(|(table, entries)| {
            let pos = entries.iter().position(|(scan, _)| *scan == id)?;
            entries.remove(pos);
            Some((*table, entries.is_empty()))
        });

        match found {
            Some((table, emptied)) => {
                if emptied {
                    self.scans.remove(&table);
                }
                true
            }
            None => false,
        }
    }

    /// Sum of the scores every open scan of `table` gave the row.
    pub fn lookup_score(&self, table: TableId, ctid: ItemPointer) -> i32 {
        self.scans.get(&table).map_or(0, |entries| {
            entries.iter()
                .map(|(_, result)| result.score_of(ctid))
                .fold(0i32, i32::saturating_add)
        })
    }

    pub fn len(&self) -> usize {
        self.scans.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.scans.is_empty()
    }

    pub fn clear_all(&mut self) {
        self.scans.clear();
    }

    /// Forgets every scan, whatever the outcome of the transaction.
    pub fn end_transaction(&mut self, end: TransactionEnd) {
        if !self.is_empty() {
            debug!(?end, scans = self.len(), "releasing scans at transaction end");
        }
        self.clear_all();
    }
}
