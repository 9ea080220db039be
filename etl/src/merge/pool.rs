use std::collections::BTreeMap;
use std::future::Future;

use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::error::{ErrorKind, EtlError};
use crate::etl_error;
use crate::merge::{FailedRow, WriteOperation};
use crate::types::RecordKey;

/// What a merge worker reports for one batch.
#[derive(Debug, Default)]
pub(crate) struct BatchOutcome {
    pub(crate) index: usize,
    pub(crate) operation: Option<WriteOperation>,
    pub(crate) applied: usize,
    pub(crate) failed_retryable: Vec<RecordKey>,
    pub(crate) failed_fatal: Vec<FailedRow>,
}

#[derive(Debug)]
struct InFlightBatch {
    operation: WriteOperation,
    keys: Vec<RecordKey>,
}

/// Tasks applying batches concurrently.
///
/// Concurrency is bounded by the caller through semaphore permits moved into each task. The pool
/// remembers the keys of every dispatched batch so that a worker that panics still has its rows
/// reported as failed.
#[derive(Debug)]
pub(crate) struct MergeWorkerPool {
    join_set: JoinSet<BatchOutcome>,
    in_flight: BTreeMap<usize, InFlightBatch>,
}

impl MergeWorkerPool {
    pub(crate) fn new() -> Self {
        Self {
            join_set: JoinSet::new(),
            in_flight: BTreeMap::new(),
        }
    }

    /// Spawns the worker for batch number `index`.
    ///
    /// `operation` and `keys` describe the batch moved into `future`, they are what gets reported
    /// if the worker never returns an outcome.
    pub(crate) fn spawn<F>(
        &mut self,
        index: usize,
        operation: WriteOperation,
        keys: Vec<RecordKey>,
        future: F,
    ) where
        F: Future<Output = BatchOutcome> + Send + 'static,
    {
        let rows = keys.len();
        self.in_flight.insert(index, InFlightBatch { operation, keys });
        self.join_set.spawn(future);

        debug!(index, rows, operation = %operation, "spawned merge worker");
    }

    /// Waits for every worker and returns their outcomes ordered by batch index.
    pub(crate) async fn wait_all(mut self) -> Vec<BatchOutcome> {
        let mut outcomes = Vec::with_capacity(self.in_flight.len());
        let mut errors: Vec<EtlError> = Vec::new();

        while let Some(result) = self.join_set.join_next().await {
            match result {
                Ok(outcome) => {
                    self.in_flight.remove(&outcome.index);
                    outcomes.push(outcome);
                }
                Err(join_err) => {
                    error!(error = %join_err, "merge worker did not complete");
                    errors.push(join_err.into());
                }
            }
        }

        // Batches still in flight belong to workers that panicked or were cancelled.
        let mut errors = errors.into_iter();
        for (index, batch) in std::mem::take(&mut self.in_flight) {
            let error = errors.next().unwrap_or_else(|| {
                etl_error!(
                    ErrorKind::MergeWorkerPanic,
                    "Merge worker stopped without reporting"
                )
            });

            outcomes.push(BatchOutcome {
                index,
                operation: Some(batch.operation),
                failed_fatal: batch
                    .keys
                    .into_iter()
                    .map(|key| FailedRow {
                        key,
                        operation: batch.operation,
                        error: error.clone(),
                    })
                    .collect(),
                ..Default::default()
            });
        }

        outcomes.sort_by_key(|outcome| outcome.index);
        outcomes
    }
}
