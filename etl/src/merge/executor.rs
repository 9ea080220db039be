use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use config::shared::{ApplyConfig, RetryConfig};
use metrics::{counter, histogram};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::delta::DeltaSet;
use crate::destination::Destination;
use crate::error::EtlResult;
#[cfg(feature = "failpoints")]
use crate::failpoints::{MERGE_BATCH__BEFORE_WRITE, etl_fail_point};
use crate::merge::policy::build_error_handling_policy;
use crate::merge::pool::{BatchOutcome, MergeWorkerPool};
use crate::merge::retry::calculate_backoff;
use crate::merge::{BatchResult, FailedRow, RowFailure, RunResult, WriteBatch, plan_batches};
use crate::metrics::{
    DESTINATION_LABEL, ETL_BATCH_RETRIES_TOTAL, ETL_BATCH_WRITE_DURATION_SECONDS,
    ETL_ROWS_APPLIED_TOTAL, ETL_ROWS_FAILED_TOTAL, OPERATION_LABEL, OUTCOME_LABEL,
};

/// Writes a [`DeltaSet`] to a destination in bounded, concurrently applied batches.
///
/// Row failures never abort the call. They are classified, retried when transient and reported in
/// the returned [`RunResult`]. The executor trusts the delta it is given and never reads back its
/// own writes.
#[derive(Debug, Clone)]
pub struct MergeExecutor<D> {
    destination: D,
    key_columns: Vec<String>,
    config: ApplyConfig,
}

impl<D> MergeExecutor<D>
where
    D: Destination + Clone + Send + Sync + 'static,
{
    pub fn new(destination: D, key_columns: Vec<String>, config: ApplyConfig) -> Self {
        Self {
            destination,
            key_columns,
            config,
        }
    }

    /// Applies `delta` and reports what happened to every key.
    ///
    /// Batches not yet dispatched when `deadline` passes are reported as unapplied and the result
    /// is flagged as timed out. Batches already dispatched always run to completion.
    pub async fn apply(&self, delta: DeltaSet, deadline: Option<Instant>) -> RunResult {
        let mut result = RunResult::new(self.destination.identity(), Utc::now());
        result.unchanged = delta.unchanged;
        result.retained = delta.retained;

        let batches = plan_batches(delta, &self.key_columns, self.config.batch.max_size);
        info!(
            run_id = %result.run_id,
            destination = %result.destination,
            batches = batches.len(),
            "applying delta"
        );

        let semaphore = Arc::new(Semaphore::new(
            usize::from(self.config.max_concurrent_batches).max(1),
        ));
        let fatal_seen = Arc::new(AtomicBool::new(false));
        let mut pool = MergeWorkerPool::new();

        let mut batches = batches.into_iter().enumerate();
        while let Some((index, batch)) = batches.next() {
            let Some(permit) = acquire_permit(&semaphore, deadline).await else {
                warn!(
                    run_id = %result.run_id,
                    index,
                    "run deadline reached, remaining batches are not dispatched"
                );
                result.timed_out = true;
                record_unapplied(&mut result, batch, batches);
                break;
            };

            if self.config.abort_on_first_fatal && fatal_seen.load(Ordering::Acquire) {
                warn!(
                    run_id = %result.run_id,
                    index,
                    "fatal row failure observed, remaining batches are not dispatched"
                );
                result.aborted = true;
                drop(permit);
                record_unapplied(&mut result, batch, batches);
                break;
            }

            let worker = BatchWorker {
                destination: self.destination.clone(),
                retry: self.config.retry.clone(),
                fatal_seen: fatal_seen.clone(),
            };
            let operation = batch.operation;
            let keys = batch.keys().cloned().collect();
            pool.spawn(index, operation, keys, async move {
                let _permit: OwnedSemaphorePermit = permit;
                worker.run(index, batch).await
            });
        }

        for outcome in pool.wait_all().await {
            self.merge_outcome(&mut result, outcome);
        }

        result.finished_at = Utc::now();

        info!(
            run_id = %result.run_id,
            destination = %result.destination,
            inserted = result.inserted,
            updated = result.updated,
            deleted = result.deleted,
            failed_retryable = result.failed_retryable.len(),
            failed_fatal = result.failed_fatal.len(),
            unapplied = result.unapplied.len(),
            timed_out = result.timed_out,
            aborted = result.aborted,
            "delta applied"
        );

        result
    }

    fn merge_outcome(&self, result: &mut RunResult, outcome: BatchOutcome) {
        let destination = D::name();

        if let Some(operation) = outcome.operation {
            result.record_applied(operation, outcome.applied);
            counter!(
                ETL_ROWS_APPLIED_TOTAL,
                DESTINATION_LABEL => destination,
                OPERATION_LABEL => operation.as_str(),
            )
            .increment(outcome.applied as u64);
        }

        if !outcome.failed_retryable.is_empty() {
            counter!(
                ETL_ROWS_FAILED_TOTAL,
                DESTINATION_LABEL => destination,
                OUTCOME_LABEL => "retryable",
            )
            .increment(outcome.failed_retryable.len() as u64);
        }

        if !outcome.failed_fatal.is_empty() {
            counter!(
                ETL_ROWS_FAILED_TOTAL,
                DESTINATION_LABEL => destination,
                OUTCOME_LABEL => "fatal",
            )
            .increment(outcome.failed_fatal.len() as u64);
        }

        result.failed_retryable.extend(outcome.failed_retryable);
        result.failed_fatal.extend(outcome.failed_fatal);
    }
}

/// Waits for a worker slot unless the deadline has passed.
///
/// The semaphore is never closed, so `None` only means the deadline was reached.
async fn acquire_permit(
    semaphore: &Arc<Semaphore>,
    deadline: Option<Instant>,
) -> Option<OwnedSemaphorePermit> {
    match deadline {
        Some(deadline) if Instant::now() >= deadline => None,
        Some(deadline) => tokio::time::timeout_at(deadline, semaphore.clone().acquire_owned())
            .await
            .ok()
            .and_then(Result::ok),
        None => semaphore.clone().acquire_owned().await.ok(),
    }
}

fn record_unapplied(
    result: &mut RunResult,
    batch: WriteBatch,
    remaining: impl Iterator<Item = (usize, WriteBatch)>,
) {
    result.unapplied.extend(batch.rows.into_iter().map(|row| row.key));
    for (_, batch) in remaining {
        result
            .unapplied
            .extend(batch.rows.into_iter().map(|row| row.key));
    }
}

/// Applies one batch, retrying rows that failed with a retryable error.
struct BatchWorker<D> {
    destination: D,
    retry: RetryConfig,
    fatal_seen: Arc<AtomicBool>,
}

impl<D> BatchWorker<D>
where
    D: Destination + Send + Sync,
{
    async fn run(self, index: usize, batch: WriteBatch) -> BatchOutcome {
        let operation = batch.operation;
        let max_attempts = self.retry.max_attempts.max(1);
        let mut outcome = BatchOutcome {
            index,
            operation: Some(operation),
            ..Default::default()
        };

        let mut pending = batch;
        let mut attempt = 1;

        loop {
            let failures = self.write(&pending).await;
            let pending_keys: HashSet<_> = pending.keys().collect();

            // Keep one failure per key and ignore keys that were not part of this attempt.
            let mut failed_keys = HashSet::with_capacity(failures.len());
            let mut retryable = HashSet::new();
            let mut fatal_in_attempt = false;

            for failure in failures {
                if !pending_keys.contains(&failure.key) || !failed_keys.insert(failure.key.clone())
                {
                    continue;
                }

                if build_error_handling_policy(&failure.error).is_retryable() {
                    debug!(
                        index,
                        attempt,
                        key = %failure.key,
                        error = %failure.error.summary(),
                        "row failed with a retryable error"
                    );
                    retryable.insert(failure.key);
                } else {
                    warn!(
                        index,
                        attempt,
                        key = %failure.key,
                        error = %failure.error.summary(),
                        "row failed with a fatal error"
                    );
                    fatal_in_attempt = true;
                    outcome.failed_fatal.push(FailedRow {
                        key: failure.key,
                        operation,
                        error: failure.error,
                    });
                }
            }

            outcome.applied += pending.len() - failed_keys.len();

            if fatal_in_attempt {
                self.fatal_seen.store(true, Ordering::Release);
            }

            if retryable.is_empty() {
                break;
            }

            if fatal_in_attempt || attempt >= max_attempts {
                warn!(
                    index,
                    attempt,
                    rows = retryable.len(),
                    "giving up on rows that failed with a retryable error"
                );
                outcome
                    .failed_retryable
                    .extend(pending.keys().filter(|key| retryable.contains(*key)).cloned());
                break;
            }

            let delay = calculate_backoff(&self.retry, attempt);
            info!(
                index,
                attempt,
                rows = retryable.len(),
                delay_ms = delay.as_millis() as u64,
                "retrying rows after a retryable failure"
            );
            counter!(
                ETL_BATCH_RETRIES_TOTAL,
                DESTINATION_LABEL => D::name(),
                OPERATION_LABEL => operation.as_str(),
            )
            .increment(1);

            tokio::time::sleep(delay).await;

            pending = pending.retain_keys(&retryable);
            attempt += 1;
        }

        outcome
    }

    /// Performs one write attempt. A call that fails as a whole fails every row of the batch.
    async fn write(&self, batch: &WriteBatch) -> Vec<RowFailure> {
        let started = Instant::now();

        let result = self.write_once(batch).await;

        histogram!(
            ETL_BATCH_WRITE_DURATION_SECONDS,
            DESTINATION_LABEL => D::name(),
            OPERATION_LABEL => batch.operation.as_str(),
        )
        .record(started.elapsed().as_secs_f64());

        match result {
            Ok(batch_result) => batch_result.failed,
            Err(err) => {
                debug!(error = %err.summary(), rows = batch.len(), "batch write failed as a whole");
                batch
                    .keys()
                    .map(|key| RowFailure {
                        key: key.clone(),
                        error: err.clone(),
                    })
                    .collect()
            }
        }
    }

    async fn write_once(&self, batch: &WriteBatch) -> EtlResult<BatchResult> {
        #[cfg(feature = "failpoints")]
        etl_fail_point(MERGE_BATCH__BEFORE_WRITE)?;

        self.destination.write_batch(batch).await
    }
}
