use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::error::EtlError;
use crate::merge::WriteOperation;
use crate::merge::policy::build_error_handling_policy;
use crate::types::RecordKey;

/// A row whose write failed with a non-retryable error.
///
/// Serializes with the retry directive and operator hint of its error next to the error itself.
#[derive(Debug, Clone)]
pub struct FailedRow {
    pub key: RecordKey,
    pub operation: WriteOperation,
    pub error: EtlError,
}

impl Serialize for FailedRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let policy = build_error_handling_policy(&self.error);

        let mut state = serializer.serialize_struct("FailedRow", 6)?;
        state.serialize_field("key", &self.key)?;
        state.serialize_field("operation", &self.operation)?;
        state.serialize_field("kind", &format!("{:?}", self.error.kind()))?;
        state.serialize_field("error", &self.error.summary())?;
        state.serialize_field("retry", policy.retry_directive().as_str())?;
        state.serialize_field("solution", &policy.solution())?;
        state.end()
    }
}

/// Outcome of a run.
///
/// Every key of the computed delta ends up in exactly one place: counted as applied, listed in
/// `failed_retryable` or `failed_fatal`, or listed in `unapplied` when the run stopped before its
/// batch was dispatched.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub destination: String,
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Matched keys that needed no write.
    pub unchanged: usize,
    /// Destination-only keys kept because deletes are disabled.
    pub retained: usize,
    /// Keys still failing with a retryable error once attempts ran out.
    pub failed_retryable: Vec<RecordKey>,
    pub failed_fatal: Vec<FailedRow>,
    /// Keys of batches never dispatched because of a timeout or an abort.
    pub unapplied: Vec<RecordKey>,
    pub timed_out: bool,
    pub aborted: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunResult {
    pub(crate) fn new(destination: String, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            destination,
            inserted: 0,
            updated: 0,
            deleted: 0,
            unchanged: 0,
            retained: 0,
            failed_retryable: Vec::new(),
            failed_fatal: Vec::new(),
            unapplied: Vec::new(),
            timed_out: false,
            aborted: false,
            started_at,
            finished_at: started_at,
        }
    }

    /// Rows written successfully.
    pub fn applied(&self) -> usize {
        self.inserted + self.updated + self.deleted
    }

    /// Rows that failed, retryable or not.
    pub fn failed(&self) -> usize {
        self.failed_retryable.len() + self.failed_fatal.len()
    }

    /// Returns `true` when every planned write was applied.
    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.unapplied.is_empty() && !self.timed_out && !self.aborted
    }

    /// Returns `true` when re-running the same pipeline may complete the remaining work.
    pub fn needs_rerun(&self) -> bool {
        !self.failed_retryable.is_empty() || !self.unapplied.is_empty() || self.timed_out
    }

    pub(crate) fn record_applied(&mut self, operation: WriteOperation, rows: usize) {
        match operation {
            WriteOperation::Insert => self.inserted += rows,
            WriteOperation::Update => self.updated += rows,
            WriteOperation::Delete => self.deleted += rows,
        }
    }
}
