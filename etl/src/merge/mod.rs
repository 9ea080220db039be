//! Application of a computed delta to the destination.

mod batch;
mod executor;
pub mod policy;
mod pool;
mod result;
pub mod retry;

pub use batch::{BatchResult, BatchRow, RowFailure, WriteBatch, WriteOperation, plan_batches};
pub use executor::MergeExecutor;
pub use result::{FailedRow, RunResult};
