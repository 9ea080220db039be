use std::path::PathBuf;

use config::shared::{ConnectionConfig, PipelineConfig};
use etl::destination::local_file::LocalFileDestination;
use etl::destination::memory::MemoryDestination;
use etl::lock::FileRunLocks;
use etl::merge::RunResult;
use etl::pipeline::Pipeline;
use etl::source::SourceReader;
use etl::source::local_file::LocalFileSource;
use etl::source::memory::MemorySource;
use etl::types::Record;
use serde_json::{Map, Value};
use tracing::info;

use crate::error::ReplicatorResult;

/// Directory used for run lock files when none is given.
const DEFAULT_LOCK_DIR_NAME: &str = "replicator-locks";

// Macro to statically dispatch pipeline creation and running
macro_rules! run_pipeline_dispatch {
    ($config:expr, $source:expr, $destination:expr, $locks:expr) => {{
        let pipeline = Pipeline::new($config, $source, $destination, $locks);
        Ok(pipeline.run().await?)
    }};
}

/// Returns the lock directory shared by every replicator process of this machine.
pub fn default_lock_dir() -> PathBuf {
    std::env::temp_dir().join(DEFAULT_LOCK_DIR_NAME)
}

/// Runs the pipeline described by `config` once.
///
/// The source and destination adapters are picked from the configured connection types. Run
/// locks are lock files in `lock_dir`, so concurrent processes targeting the same destination
/// exclude each other.
pub async fn run_pipeline(config: PipelineConfig, lock_dir: PathBuf) -> ReplicatorResult<RunResult> {
    info!(
        source = config.source.type_name(),
        destination = config.destination.type_name(),
        lock_dir = %lock_dir.display(),
        "starting replicator run"
    );

    let locks = FileRunLocks::new(lock_dir);

    // For each source, we dispatch on the destination. This is more verbose due to static
    // dispatch, but every adapter stays a concrete type.
    match config.source.clone() {
        ConnectionConfig::LocalFile {
            path,
            file_type,
            data_key,
        } => {
            let source = LocalFileSource::new(path, file_type, data_key);
            run_with_source(config, source, locks).await
        }
        ConnectionConfig::Memory { records } => {
            let source = MemorySource::new(into_records(records));
            run_with_source(config, source, locks).await
        }
    }
}

async fn run_with_source<S>(
    config: PipelineConfig,
    source: S,
    locks: FileRunLocks,
) -> ReplicatorResult<RunResult>
where
    S: SourceReader + Send + Sync,
{
    match config.destination.clone() {
        ConnectionConfig::LocalFile {
            path,
            file_type,
            data_key,
        } => {
            let destination = LocalFileDestination::new(path, file_type, data_key);
            run_pipeline_dispatch!(config, source, destination, locks)
        }
        ConnectionConfig::Memory { records } => {
            let destination = MemoryDestination::with_records(into_records(records));
            run_pipeline_dispatch!(config, source, destination, locks)
        }
    }
}

fn into_records(records: Vec<Map<String, Value>>) -> Vec<Record> {
    records.into_iter().map(Record::from).collect()
}
