use std::fmt;

use crate::error::EtlResult;

/// Provider of exclusive per-destination run locks.
pub trait RunLocks {
    /// Acquires the lock of `identity` without waiting.
    fn try_acquire(&self, identity: &str) -> EtlResult<RunLockGuard>;
}

/// Held lock. The lock is released when the guard is dropped.
pub struct RunLockGuard {
    identity: String,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl RunLockGuard {
    pub(crate) fn new(identity: String, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            identity,
            release: Some(Box::new(release)),
        }
    }

    /// Returns the identity the lock is held for.
    pub fn identity(&self) -> &str {
        &self.identity
    }
}

impl fmt::Debug for RunLockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunLockGuard")
            .field("identity", &self.identity)
            .finish()
    }
}

impl Drop for RunLockGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}
