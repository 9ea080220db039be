//! Exclusive run locks scoped to a destination identity.
//!
//! A run holds its lock for its whole duration. A second run against the same destination fails
//! fast with [`crate::error::ErrorKind::RunInProgress`] instead of waiting.

mod base;
mod file;
mod memory;

pub use base::{RunLockGuard, RunLocks};
pub use file::FileRunLocks;
pub use memory::MemoryRunLocks;
