use std::sync::Arc;

use config::shared::PipelineConfig;
use metrics::{counter, histogram};
use tokio::time::Instant;
use tracing::info;

use crate::delta::{DeltaSet, compute_delta};
use crate::destination::Destination;
use crate::error::EtlResult;
#[cfg(feature = "failpoints")]
use crate::failpoints::{PIPELINE_RUN__AFTER_DELTA, etl_fail_point};
use crate::lock::RunLocks;
use crate::merge::{MergeExecutor, RunResult};
use crate::metrics::{
    DESTINATION_LABEL, ETL_DELTA_ROWS_TOTAL, ETL_RUN_DURATION_SECONDS, OPERATION_LABEL,
    STRATEGY_LABEL, register_metrics,
};
use crate::schema::check_declared_schema;
use crate::source::SourceReader;
use crate::types::RecordSet;

/// One reconciliation of a destination against a source.
///
/// A run fetches both sides concurrently, computes the delta and applies it. Configuration,
/// data integrity, schema and fetch errors abort the run before anything is written. Row level
/// apply failures never abort it, they are reported in the returned [`RunResult`].
///
/// Running the same pipeline again is always safe: the delta is recomputed from the current
/// state of both sides.
#[derive(Debug)]
pub struct Pipeline<S, D, L> {
    config: Arc<PipelineConfig>,
    source: S,
    destination: D,
    locks: L,
}

impl<S, D, L> Pipeline<S, D, L>
where
    S: SourceReader + Send + Sync,
    D: Destination + Clone + Send + Sync + 'static,
    L: RunLocks,
{
    pub fn new(config: PipelineConfig, source: S, destination: D, locks: L) -> Self {
        Self {
            config: Arc::new(config),
            source,
            destination,
            locks,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn run(&self) -> EtlResult<RunResult> {
        self.config.validate()?;
        register_metrics();

        let started = Instant::now();
        let deadline = self.config.apply.run_timeout().map(|timeout| started + timeout);
        let identity = self.destination.identity();

        // We hold the destination lock for the whole run, a concurrent run fails fast.
        let _lock = self.locks.try_acquire(&identity)?;

        info!(
            destination = %identity,
            source_kind = S::name(),
            destination_kind = D::name(),
            strategy = self.config.delta.strategy.as_str(),
            "starting pipeline run"
        );

        let key_columns = self.config.key_columns();

        // Both reads are independent, so we run them concurrently. A failure on either side
        // aborts the run since no delta may be computed from partial data.
        let (source_records, destination_records) = tokio::try_join!(
            self.source.fetch(),
            self.destination.read_existing(key_columns)
        )?;

        if let Some(schema) = &self.config.schema {
            check_declared_schema(&source_records, schema)?;
        }

        let source = RecordSet::new(source_records, key_columns)?;
        let destination = RecordSet::new(destination_records, key_columns)?;

        let delta = compute_delta(&source, &destination, &self.config.delta)?;
        self.record_delta_metrics(&identity, &delta);

        #[cfg(feature = "failpoints")]
        etl_fail_point(PIPELINE_RUN__AFTER_DELTA)?;

        let executor = MergeExecutor::new(
            self.destination.clone(),
            key_columns.to_vec(),
            self.config.apply.clone(),
        );
        let result = executor.apply(delta, deadline).await;

        let elapsed = started.elapsed();
        histogram!(ETL_RUN_DURATION_SECONDS, DESTINATION_LABEL => D::name())
            .record(elapsed.as_secs_f64());

        info!(
            run_id = %result.run_id,
            destination = %identity,
            inserted = result.inserted,
            updated = result.updated,
            deleted = result.deleted,
            unchanged = result.unchanged,
            failed = result.failed(),
            unapplied = result.unapplied.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "pipeline run finished"
        );

        Ok(result)
    }

    fn record_delta_metrics(&self, identity: &str, delta: &DeltaSet) {
        let strategy = self.config.delta.strategy.as_str();

        info!(
            destination = %identity,
            inserts = delta.inserts.len(),
            updates = delta.updates.len(),
            deletes = delta.deletes.len(),
            unchanged = delta.unchanged,
            retained = delta.retained,
            "computed delta"
        );

        for (operation, rows) in [
            ("insert", delta.inserts.len()),
            ("update", delta.updates.len()),
            ("delete", delta.deletes.len()),
            ("unchanged", delta.unchanged),
        ] {
            counter!(
                ETL_DELTA_ROWS_TOTAL,
                DESTINATION_LABEL => D::name(),
                STRATEGY_LABEL => strategy,
                OPERATION_LABEL => operation,
            )
            .increment(rows as u64);
        }
    }
}
