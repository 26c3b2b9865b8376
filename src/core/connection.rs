use std::sync::OnceLock;
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use crate::core::config::Config;
use crate::core::encoding::Encoding;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::IndexDescriptor;
use crate::engine::{EngineConnection, LocalEngine};
use crate::storage::file_lock::{DatabaseLock, IndexLock, LockMode};
use crate::storage::layout::StorageLayout;

/// Owner of the engine session shared by every index of the process.
///
/// The session is opened on first use and reused afterwards; `close` drops
/// it and a later call opens it again.
///
/// Several processes may open the same database. Engine work runs inside a
/// [`SessionScope`]: a read scope holds the database lock shared, a write
/// scope holds it exclusively and syncs on exit. Both reload the session
/// first when another process synced since it was loaded.
pub struct ConnectionManager {
    config: Config,
    layout: StorageLayout,
    encoding: Encoding,
    engine: Mutex<Option<Box<dyn EngineConnection>>>,
    held: Mutex<Option<HeldLock>>,
}

/// Database lock of the open scopes; nested scopes share it.
struct HeldLock {
    lock: DatabaseLock,
    depth: usize,
}

impl ConnectionManager {
    pub fn new(config: Config) -> Result<Self> {
        let layout = StorageLayout::new(&config)?;
        let encoding = Encoding::from_host(&config.encoding);
        Ok(ConnectionManager {
            config,
            layout,
            encoding,
            engine: Mutex::new(None),
            held: Mutex::new(None),
        })
    }

    /// Uses an already open engine session instead of the embedded engine.
    pub fn with_connection(config: Config, engine: Box<dyn EngineConnection>) -> Result<Self> {
        let manager = ConnectionManager::new(config)?;
        *manager.engine.lock() = Some(engine);
        Ok(manager)
    }

    /// Opens the embedded engine database now instead of on first use.
    pub fn open_or_create(config: Config) -> Result<Self> {
        let manager = ConnectionManager::new(config)?;
        manager.begin_write()?.commit()?;
        Ok(manager)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Runs `f` against the session, opening it first when needed. Callers
    /// sharing the database with other processes wrap this in a scope.
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut dyn EngineConnection) -> Result<R>) -> Result<R> {
        let mut guard = self.engine.lock();
        if guard.is_none() {
            let engine = LocalEngine::open(&self.config)?;
            info!(encoding = ?self.encoding, "engine session opened");
            *guard = Some(Box::new(engine));
        }

        match guard.as_mut() {
            Some(engine) => f(engine.as_mut()),
            None => Err(Error::new(ErrorKind::Internal, "engine session missing".to_string())),
        }
    }

    /// Opens a scope for engine reads. Inside a write scope it joins that
    /// scope instead.
    pub fn begin_read(&self) -> Result<SessionScope<'_>> {
        self.begin(LockMode::Shared)
    }

    /// Opens a scope for engine mutations, synced when it ends. Fails inside
    /// a read scope.
    pub fn begin_write(&self) -> Result<SessionScope<'_>> {
        self.begin(LockMode::Exclusive)
    }

    fn begin(&self, mode: LockMode) -> Result<SessionScope<'_>> {
        {
            let mut held = self.held.lock();
            match held.as_mut() {
                Some(current) => {
                    if mode == LockMode::Exclusive && current.lock.mode == LockMode::Shared {
                        return Err(Error::new(
                            ErrorKind::InvalidState,
                            "cannot write while the database is locked for reading".to_string(),
                        ));
                    }
                    current.depth += 1;
                    return Ok(SessionScope { conn: self, mode, committed: false });
                }
                None => {
                    let lock = DatabaseLock::acquire(&self.layout, mode)?;
                    *held = Some(HeldLock { lock, depth: 1 });
                }
            }
        }

        let scope = SessionScope { conn: self, mode, committed: false };
        if self.with_engine(|engine| engine.refresh())? {
            debug!("session reloaded from disk");
        }
        Ok(scope)
    }

    fn end(&self) {
        let mut held = self.held.lock();
        if let Some(current) = held.as_mut() {
            current.depth -= 1;
            if current.depth == 0 {
                *held = None;
            }
        }
    }

    /// Sends `command` and returns its output. When the engine streams
    /// several outputs only the last one is kept.
    pub fn command(&self, command: &str) -> Result<String> {
        self.try_command(command)?.ok_or_else(|| {
            Error::new(ErrorKind::Communication, "query returned no result".to_string())
                .with_query(command)
        })
    }

    /// Like [`command`](Self::command), but an empty output is `None`.
    pub fn try_command(&self, command: &str) -> Result<Option<String>> {
        debug!(command, "sending command");
        let _scope = self.begin_read()?;
        let output = self.with_engine(|engine| exchange(engine, command))?;

        output.map(|bytes| {
            String::from_utf8(bytes).map_err(|e| {
                Error::new(ErrorKind::Communication, format!("response is not valid UTF-8: {}", e))
                    .with_query(command)
            })
        }).transpose()
    }

    /// Takes the lock of `index` in `mode`; released when the guard drops.
    pub fn lock(&self, index: &IndexDescriptor, mode: LockMode) -> Result<IndexLock> {
        IndexLock::acquire(&self.layout, index.identity, &index.storage_path, mode)
    }

    pub fn sync(&self) -> Result<()> {
        let mut guard = self.engine.lock();
        match guard.as_mut() {
            Some(engine) => engine.sync(),
            None => Ok(()),
        }
    }

    /// Syncs and closes the session if one is open.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.engine.lock();
        if let Some(mut engine) = guard.take() {
            engine.close()?;
            info!("engine session closed");
        }
        Ok(())
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "failed to close engine session");
        }
    }
}

/// An open read or write scope of a [`ConnectionManager`]. The database
/// lock is released when the outermost scope ends.
pub struct SessionScope<'a> {
    conn: &'a ConnectionManager,
    mode: LockMode,
    committed: bool,
}

impl std::fmt::Debug for SessionScope<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionScope")
            .field("mode", &self.mode)
            .field("committed", &self.committed)
            .finish_non_exhaustive()
    }
}

impl SessionScope<'_> {
    pub fn mode(&self) -> LockMode {
        self.mode
    }

    /// Ends the scope, returning the sync error a write scope would
    /// otherwise only log.
    pub fn commit(mut self) -> Result<()> {
        if self.mode == LockMode::Exclusive {
            self.conn.sync()?;
        }
        self.committed = true;
        Ok(())
    }
}

impl Drop for SessionScope<'_> {
    fn drop(&mut self) {
        if self.mode == LockMode::Exclusive && !self.committed {
            if let Err(e) = self.conn.sync() {
                warn!(error = %e, "failed to sync at the end of a write scope");
            }
        }
        self.conn.end();
    }
}

fn exchange(engine: &mut dyn EngineConnection, command: &str) -> Result<Option<Vec<u8>>> {
    engine.send(command).map_err(|e| {
        Error::new(ErrorKind::Communication, format!("failed to send: {}", e)).with_query(command)
    })?;

    let mut kept: Option<Vec<u8>> = None;
    let mut current = Vec::new();
    loop {
        let chunk = engine.recv().map_err(|e| {
            Error::new(ErrorKind::Communication, format!("failed to receive: {}", e)).with_query(command)
        })?;
        current.extend_from_slice(&chunk.data);

        if chunk.output_end && !current.is_empty() {
            if kept.is_some() {
                warn!(command, "discard result");
            }
            kept = Some(std::mem::take(&mut current));
        }

        if !chunk.more {
            break;
        }
    }

    Ok(kept)
}

static PROCESS: OnceLock<ConnectionManager> = OnceLock::new();

/// Opens the process-wide connection manager. Later calls return the
/// manager of the first one.
pub fn init_process(config: Config) -> Result<&'static ConnectionManager> {
    if let Some(manager) = PROCESS.get() {
        return Ok(manager);
    }
    let manager = ConnectionManager::open_or_create(config)?;
    Ok(PROCESS.get_or_init(|| manager))
}

pub fn process() -> Result<&'static ConnectionManager> {
    PROCESS.get().ok_or_else(|| {
        Error::new(ErrorKind::InvalidState, "engine connection is not initialized".to_string())
    })
}

/// Closes the process-wide session at exit.
pub fn shutdown_process() -> Result<()> {
    match PROCESS.get() {
        Some(manager) => manager.close(),
        None => Ok(()),
    }
}
