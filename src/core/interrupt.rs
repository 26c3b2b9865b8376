use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use crate::core::error::{Error, ErrorKind, Result};

/// Host-issued cancellation signal polled inside long row loops.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    pending: Arc<AtomicBool>,
}

impl Interrupt {
    pub fn new() -> Self {
        Interrupt::default()
    }

    pub fn raise(&self) {
        self.pending.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.pending.store(false, Ordering::SeqCst);
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }

    /// Fails with `Interrupted` once the host raised the flag.
    pub fn check(&self) -> Result<()> {
        if self.is_pending() {
            return Err(Error::new(ErrorKind::Interrupted, "canceling statement due to user request".to_string()));
        }
        Ok(())
    }
}
