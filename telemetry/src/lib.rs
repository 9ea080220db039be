//! Logging setup shared by the delta pipeline binaries and tests.

pub mod tracing;
