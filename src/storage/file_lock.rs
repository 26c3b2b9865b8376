use std::fs::{self, File, OpenOptions};
use std::path::Path;
use tracing::debug;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::IndexIdentity;
use crate::storage::layout::StorageLayout;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// Advisory lock on one index, held until dropped. Mutations take it
/// exclusively; scans take it shared when configured to.
pub struct IndexLock {
    pub file: File,
    pub identity: IndexIdentity,
    pub mode: LockMode,
}

impl IndexLock {
    pub fn acquire(layout: &StorageLayout, identity: IndexIdentity, base: &Path, mode: LockMode) -> Result<Self> {
        let file = lock_file(&layout.lock_path(base), mode)
            .map_err(|e| Error::new(ErrorKind::Io, format!("failed to lock index {}: {}", identity.0, e)))?;

        debug!(index = identity.0, ?mode, "index lock acquired");
        Ok(IndexLock { file, identity, mode })
    }
}

impl Drop for IndexLock {
    fn drop(&mut self) {
        unlock_file(&self.file);
    }
}

/// Lock on the whole engine database. Sessions read under it shared and
/// write and sync under it exclusively, so a session always works on the
/// latest synced state.
pub struct DatabaseLock {
    pub file: File,
    pub mode: LockMode,
}

impl DatabaseLock {
    pub fn acquire(layout: &StorageLayout, mode: LockMode) -> Result<Self> {
        let file = lock_file(&layout.database_lock_path(), mode)
            .map_err(|e| Error::new(ErrorKind::Io, format!("failed to lock database: {}", e)))?;

        debug!(?mode, "database lock acquired");
        Ok(DatabaseLock { file, mode })
    }
}

impl Drop for DatabaseLock {
    fn drop(&mut self) {
        unlock_file(&self.file);
    }
}

fn lock_file(path: &Path, mode: LockMode) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)?;

    // Platform-specific locking
    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;
        use libc::{flock, LOCK_EX, LOCK_SH};

        let operation = match mode {
            LockMode::Exclusive => LOCK_EX,
            LockMode::Shared => LOCK_SH,
        };

        unsafe {
            if flock(file.as_raw_fd(), operation) != 0 {
                return Err(std::io::Error::last_os_error());
            }
        }
    }

    Ok(file)
}

fn unlock_file(file: &File) {
    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;
        use libc::{flock, LOCK_UN};

        unsafe {
            flock(file.as_raw_fd(), LOCK_UN);
        }
    }
}
