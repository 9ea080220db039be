use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::destination::Destination;
use crate::destination::base::apply_to_records;
use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;
use crate::merge::{BatchResult, RowFailure, WriteBatch};
use crate::types::{Record, RecordKey};

/// A failure injected into a [`MemoryDestination`], firing a limited or unlimited number of times.
#[derive(Debug, Clone, Copy)]
struct ScriptedFailure {
    kind: ErrorKind,
    remaining: Option<u32>,
}

impl ScriptedFailure {
    /// Returns `true` if the failure fires for this call.
    fn fire(&mut self) -> bool {
        match &mut self.remaining {
            None => true,
            Some(0) => false,
            Some(remaining) => {
                *remaining -= 1;
                true
            }
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    records: Vec<Record>,
    batches: Vec<WriteBatch>,
    row_failures: HashMap<RecordKey, ScriptedFailure>,
    write_failure: Option<ScriptedFailure>,
    read_failure: Option<ErrorKind>,
}

/// In-memory destination for tests and local experiments.
///
/// Clones share their state, so a test can keep a handle and inspect what the run wrote. Failures
/// can be scripted per row, per batch call or for reads to exercise retry and partial failure
/// handling.
#[derive(Debug, Clone)]
pub struct MemoryDestination {
    identity: String,
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDestination {
    /// Creates an empty destination with a unique identity.
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    /// Creates a destination pre-populated with `records`.
    pub fn with_records(records: Vec<Record>) -> Self {
        Self {
            identity: format!("memory://{}", Uuid::new_v4()),
            inner: Arc::new(Mutex::new(Inner {
                records,
                ..Default::default()
            })),
        }
    }

    /// Replaces the identity used for run locking.
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    /// Returns the records currently stored.
    pub async fn records(&self) -> Vec<Record> {
        self.inner.lock().await.records.clone()
    }

    /// Returns every batch received so far, including failed attempts.
    pub async fn batches(&self) -> Vec<WriteBatch> {
        self.inner.lock().await.batches.clone()
    }

    /// Makes writes of `key` fail with `kind`, `times` times or forever when `None`.
    pub async fn fail_row(&self, key: RecordKey, kind: ErrorKind, times: Option<u32>) {
        self.inner.lock().await.row_failures.insert(
            key,
            ScriptedFailure {
                kind,
                remaining: times,
            },
        );
    }

    /// Makes whole batch calls fail with `kind`, `times` times or forever when `None`.
    pub async fn fail_writes(&self, kind: ErrorKind, times: Option<u32>) {
        self.inner.lock().await.write_failure = Some(ScriptedFailure {
            kind,
            remaining: times,
        });
    }

    /// Makes every read fail with `kind`.
    pub async fn fail_reads(&self, kind: ErrorKind) {
        self.inner.lock().await.read_failure = Some(kind);
    }
}

impl Default for MemoryDestination {
    fn default() -> Self {
        Self::new()
    }
}

impl Destination for MemoryDestination {
    fn name() -> &'static str {
        "memory"
    }

    fn identity(&self) -> String {
        self.identity.clone()
    }

    async fn read_existing(&self, _key_columns: &[String]) -> EtlResult<Vec<Record>> {
        let inner = self.inner.lock().await;

        if let Some(kind) = inner.read_failure {
            return Err(etl_error!(kind, "Scripted destination read failure"));
        }

        info!(records = inner.records.len(), "reading existing records");

        Ok(inner.records.clone())
    }

    async fn write_batch(&self, batch: &WriteBatch) -> EtlResult<BatchResult> {
        let mut inner = self.inner.lock().await;
        inner.batches.push(batch.clone());

        if let Some(failure) = inner.write_failure.as_mut()
            && failure.fire()
        {
            return Err(etl_error!(
                failure.kind,
                "Scripted batch failure",
                format!("{} batch of {} rows", batch.operation, batch.len())
            ));
        }

        let mut failed = Vec::new();
        let mut skip = HashSet::new();
        for row in &batch.rows {
            if let Some(failure) = inner.row_failures.get_mut(&row.key)
                && failure.fire()
            {
                skip.insert(row.key.clone());
                failed.push(RowFailure {
                    key: row.key.clone(),
                    error: etl_error!(
                        failure.kind,
                        "Scripted row failure",
                        format!("{} of key {}", batch.operation, row.key)
                    ),
                });
            }
        }

        failed.extend(apply_to_records(&mut inner.records, batch, &skip));

        info!(
            operation = %batch.operation,
            rows = batch.len(),
            failed = failed.len(),
            "wrote batch"
        );

        Ok(BatchResult::with_failures(failed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::{BatchRow, WriteOperation};
    use crate::types::Cell;

    fn insert_batch(ids: &[i64]) -> WriteBatch {
        WriteBatch::new(
            WriteOperation::Insert,
            vec!["id".to_owned()].into(),
            ids.iter()
                .map(|&id| BatchRow {
                    key: RecordKey::new(vec![Cell::I64(id)]),
                    record: Record::from_pairs([("id", Cell::I64(id))]),
                })
                .collect(),
        )
    }

    #[tokio::test]
    async fn scripted_row_failure_fires_limited_times() {
        let destination = MemoryDestination::new();
        destination
            .fail_row(
                RecordKey::new(vec![Cell::I64(2)]),
                ErrorKind::DestinationUnavailable,
                Some(1),
            )
            .await;

        let first = destination.write_batch(&insert_batch(&[1, 2])).await.unwrap();
        assert_eq!(first.failed.len(), 1);
        assert_eq!(destination.records().await.len(), 1);

        let second = destination.write_batch(&insert_batch(&[2])).await.unwrap();
        assert!(second.is_success());
        assert_eq!(destination.records().await.len(), 2);
        assert_eq!(destination.batches().await.len(), 2);
    }

    #[tokio::test]
    async fn scripted_write_failure_rejects_whole_batch() {
        let destination = MemoryDestination::new();
        destination
            .fail_writes(ErrorKind::DestinationUnavailable, None)
            .await;

        let err = destination
            .write_batch(&insert_batch(&[1]))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DestinationUnavailable);
        assert!(destination.records().await.is_empty());
    }

    #[tokio::test]
    async fn clones_share_state() {
        let destination = MemoryDestination::new();
        let clone = destination.clone();

        clone.write_batch(&insert_batch(&[1])).await.unwrap();

        assert_eq!(destination.records().await.len(), 1);
        assert_eq!(destination.identity(), clone.identity());
    }
}
