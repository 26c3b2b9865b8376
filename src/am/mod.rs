//! Index access method entry points the host calls.

pub mod scan;
pub mod bulk;
pub mod cost;

use crate::codec::value::Value;
use crate::core::connection::ConnectionManager;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{IndexDescriptor, ItemPointer};
use crate::storage::file_lock::LockMode;
use crate::writer::mutation::MutationBridge;

pub use bulk::{build, bulk_delete, vacuum_cleanup};
pub use cost::cost_estimate;
pub use scan::IndexScan;

/// Indexes one new heap row under the index's exclusive lock.
pub fn insert(conn: &ConnectionManager, index: &IndexDescriptor, ctid: ItemPointer, values: &[Option<Value>]) -> Result<bool> {
    let _lock = conn.lock(index, LockMode::Exclusive)?;
    MutationBridge::new(conn).insert(index, ctid, values)?;
    Ok(true)
}

/// The access method takes no storage parameters.
pub fn options(reloptions: &[(String, String)], validate: bool) -> Result<()> {
    match reloptions.first() {
        Some((name, _)) if validate => Err(Error::new(
            ErrorKind::InvalidArgument,
            format!("unrecognized parameter \"{}\"", name),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::attribute::AttributeKind;
    use crate::core::config::Config;
    use crate::core::interrupt::Interrupt;
    use crate::core::types::{AttributeDef, IndexIdentity, TableId};
    use crate::query::types::{ScanKey, Strategy};
    use crate::search::cursor::Direction;
    use crate::search::registry::UnitOfWork;
    use tempfile::TempDir;

    fn setup() -> (TempDir, ConnectionManager, IndexDescriptor) {
        let dir = TempDir::new().unwrap();
        let conn = ConnectionManager::open_or_create(Config::with_data_dir(dir.path())).unwrap();
        let index = IndexDescriptor::new(IndexIdentity(500), "memo_idx", TableId(77), "base/1/500")
            .add_attribute(AttributeDef::new("memo", AttributeKind::Text));
        (dir, conn, index)
    }

    fn row(block: u32, offset: u16, memo: &str) -> (ItemPointer, Vec<Option<Value>>) {
        (ItemPointer::new(block, offset), vec![Some(Value::text(memo))])
    }

    #[test]
    fn inserted_rows_are_found() {
        let (_dir, conn, index) = setup();
        build(&conn, &index, Vec::new(), &Interrupt::new()).unwrap();
        insert(&conn, &index, ItemPointer::new(0, 2), &[Some(Value::text("rust search"))]).unwrap();
        insert(&conn, &index, ItemPointer::new(0, 1), &[Some(Value::text("plain words"))]).unwrap();

        let mut uow = UnitOfWork::new();
        let keys = vec![ScanKey::new(1, Strategy::Contains, Value::text("search"))];
        let mut scan = IndexScan::begin(&conn, &index, keys);
        assert_eq!(scan.get_next_tuple(&mut uow, Direction::Forward, false).unwrap(), Some(ItemPointer::new(0, 2)));
        assert_eq!(scan.get_next_tuple(&mut uow, Direction::Forward, false).unwrap(), None);
        scan.end_scan(&mut uow);
        assert!(uow.is_empty());
    }

    #[test]
    fn backward_scans_fail() {
        let (_dir, conn, index) = setup();
        build(&conn, &index, vec![row(0, 1, "a")], &Interrupt::new()).unwrap();

        let mut uow = UnitOfWork::new();
        let mut scan = IndexScan::begin(&conn, &index, Vec::new());
        let err = scan.get_next_tuple(&mut uow, Direction::Backward, false).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedOperation);
        // rejected before the engine is asked
        assert!(!scan.is_open());
        assert!(uow.is_empty());
        assert_eq!(scan.get_next_tuple(&mut uow, Direction::NoMovement, false).unwrap_err().kind, ErrorKind::UnsupportedOperation);
        assert!(uow.is_empty());
    }

    #[test]
    fn kill_prior_removes_the_dead_row() {
        let (_dir, conn, index) = setup();
        build(&conn, &index, vec![row(0, 1, "a"), row(0, 2, "b")], &Interrupt::new()).unwrap();

        let mut uow = UnitOfWork::new();
        let mut scan = IndexScan::begin(&conn, &index, Vec::new());
        assert_eq!(scan.get_next_tuple(&mut uow, Direction::Forward, true).unwrap_err().kind, ErrorKind::InvalidState);
        assert_eq!(scan.get_next_tuple(&mut uow, Direction::Forward, false).unwrap(), Some(ItemPointer::new(0, 1)));
        assert_eq!(scan.get_next_tuple(&mut uow, Direction::Forward, true).unwrap(), Some(ItemPointer::new(0, 2)));
        scan.end_scan(&mut uow);

        let mut scan = IndexScan::begin(&conn, &index, Vec::new());
        assert_eq!(scan.get_all_matches(&mut uow).unwrap(), vec![ItemPointer::new(0, 2)]);
    }

    #[test]
    fn rescan_replaces_keys_and_result() {
        let (_dir, conn, index) = setup();
        build(&conn, &index, vec![row(0, 1, "apple pie"), row(0, 2, "banana split")], &Interrupt::new()).unwrap();

        let mut uow = UnitOfWork::new();
        let mut scan = IndexScan::begin(&conn, &index, vec![ScanKey::new(1, Strategy::Contains, Value::text("apple"))]);
        assert_eq!(scan.get_all_matches(&mut uow).unwrap(), vec![ItemPointer::new(0, 1)]);
        assert_eq!(uow.len(), 1);

        scan.rescan(&mut uow, Some(vec![ScanKey::new(1, Strategy::Contains, Value::text("banana"))]));
        assert!(!scan.is_open());
        assert!(uow.is_empty());
        assert_eq!(scan.get_all_matches(&mut uow).unwrap(), vec![ItemPointer::new(0, 2)]);
    }

    #[test]
    fn scans_can_take_a_shared_lock() {
        let dir = TempDir::new().unwrap();
        let config = Config { lock_scans: true, ..Config::with_data_dir(dir.path()) };
        let conn = ConnectionManager::open_or_create(config).unwrap();
        let index = IndexDescriptor::new(IndexIdentity(501), "locked_idx", TableId(1), "base/1/501")
            .add_attribute(AttributeDef::new("memo", AttributeKind::Text));
        build(&conn, &index, vec![row(0, 1, "x")], &Interrupt::new()).unwrap();

        let mut uow = UnitOfWork::new();
        let mut scan = IndexScan::begin(&conn, &index, Vec::new());
        assert_eq!(scan.get_all_matches(&mut uow).unwrap().len(), 1);
        // the shared lock is gone once the result is read
        insert(&conn, &index, ItemPointer::new(0, 2), &[None]).unwrap();
    }

    #[test]
    fn no_storage_parameters() {
        let given = vec![("fillfactor".to_string(), "70".to_string())];
        assert!(options(&[], true).is_ok());
        assert!(options(&given, false).is_ok());
        assert_eq!(options(&given, true).unwrap_err().kind, ErrorKind::InvalidArgument);
    }
}
