//! Shared configuration types for delta pipelines.

mod apply;
mod base;
mod connection;
mod delta;
mod pipeline;
mod schema;

pub use apply::{ApplyConfig, BatchConfig, RetryConfig};
pub use base::ValidationError;
pub use connection::{ConnectionConfig, FileType};
pub use delta::{DeltaConfig, DeltaStrategy, KeyMatchPolicy};
pub use pipeline::PipelineConfig;
pub use schema::{ColumnSchema, ColumnType};
