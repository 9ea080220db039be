use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;
use crate::lock::{RunLockGuard, RunLocks};

/// Run locks shared by the pipelines of one process.
#[derive(Debug, Clone, Default)]
pub struct MemoryRunLocks {
    held: Arc<Mutex<HashSet<String>>>,
}

impl MemoryRunLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if a run currently holds the lock of `identity`.
    pub fn is_held(&self, identity: &str) -> bool {
        self.held
            .lock()
            .map(|held| held.contains(identity))
            .unwrap_or(false)
    }
}

impl RunLocks for MemoryRunLocks {
    fn try_acquire(&self, identity: &str) -> EtlResult<RunLockGuard> {
        let mut held = self.held.lock().map_err(|_| {
            etl_error!(
                ErrorKind::InvalidState,
                "Run lock table is poisoned",
                identity.to_owned()
            )
        })?;

        if !held.insert(identity.to_owned()) {
            return Err(etl_error!(
                ErrorKind::RunInProgress,
                "Another run holds the destination lock",
                identity.to_owned()
            ));
        }

        debug!(identity, "acquired run lock");

        let table = self.held.clone();
        let owned = identity.to_owned();
        Ok(RunLockGuard::new(identity.to_owned(), move || {
            if let Ok(mut held) = table.lock() {
                held.remove(&owned);
            }
            debug!(identity = %owned, "released run lock");
        }))
    }
}
