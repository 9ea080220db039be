//! Delta reconciliation and merge engine.
//!
//! A run reads the current records of a source and a destination, classifies every key into
//! inserts, updates, deletes or no-ops with [`delta::compute_delta`], then writes the result in
//! bounded, concurrently applied batches through [`merge::MergeExecutor`]. The
//! [`pipeline::Pipeline`] sequences a run and holds the destination run lock.

pub mod conversions;
pub mod delta;
pub mod destination;
pub mod error;
#[cfg(feature = "failpoints")]
pub mod failpoints;
pub mod lock;
mod macros;
pub mod merge;
pub mod metrics;
pub mod pipeline;
pub mod schema;
pub mod source;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
