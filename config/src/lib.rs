//! Configuration types and loading for delta pipelines.
//!
//! The [`shared`] module holds the strongly typed pipeline configuration that every other crate
//! consumes, while [`load`] turns a JSON file plus environment overrides into a validated
//! [`shared::PipelineConfig`].

pub mod load;
pub mod shared;

pub use load::{LoadConfigError, load_pipeline_config};
