use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::delta::DeltaSet;
use crate::error::EtlError;
use crate::types::{Record, RecordKey};

/// Kind of write a batch performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOperation {
    Insert,
    Update,
    Delete,
}

impl WriteOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteOperation::Insert => "insert",
            WriteOperation::Update => "update",
            WriteOperation::Delete => "delete",
        }
    }
}

impl fmt::Display for WriteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of a [`WriteBatch`].
///
/// For deletes `record` holds only the key columns.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRow {
    pub key: RecordKey,
    pub record: Record,
}

/// Rows sharing one write operation, sent to the destination in a single call.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteBatch {
    pub operation: WriteOperation,
    /// Columns the row keys are made of, in key order.
    pub key_columns: Arc<[String]>,
    pub rows: Vec<BatchRow>,
}

impl WriteBatch {
    pub fn new(operation: WriteOperation, key_columns: Arc<[String]>, rows: Vec<BatchRow>) -> Self {
        Self {
            operation,
            key_columns,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &RecordKey> {
        self.rows.iter().map(|row| &row.key)
    }

    /// Returns a batch with the same operation holding only the rows whose key is in `keys`.
    pub fn retain_keys(&self, keys: &HashSet<RecordKey>) -> WriteBatch {
        WriteBatch {
            operation: self.operation,
            key_columns: self.key_columns.clone(),
            rows: self
                .rows
                .iter()
                .filter(|row| keys.contains(&row.key))
                .cloned()
                .collect(),
        }
    }
}

/// A row the destination refused, with the reason.
#[derive(Debug, Clone)]
pub struct RowFailure {
    pub key: RecordKey,
    pub error: EtlError,
}

/// Outcome of a single [`WriteBatch`] call.
///
/// Rows not listed in `failed` were applied.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub failed: Vec<RowFailure>,
}

impl BatchResult {
    pub fn success() -> Self {
        Self::default()
    }

    pub fn with_failures(failed: Vec<RowFailure>) -> Self {
        Self { failed }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Splits a delta into batches of at most `max_size` rows: inserts first, then updates, then
/// deletes. Rows keep their order within each operation.
pub fn plan_batches(delta: DeltaSet, key_columns: &[String], max_size: usize) -> Vec<WriteBatch> {
    let max_size = max_size.max(1);
    let shared_columns: Arc<[String]> = key_columns.into();
    let mut batches = Vec::new();

    let inserts = delta.inserts.into_iter().map(|insert| BatchRow {
        key: insert.key,
        record: insert.record,
    });
    push_chunks(&mut batches, WriteOperation::Insert, &shared_columns, inserts, max_size);

    let updates = delta.updates.into_iter().map(|update| BatchRow {
        key: update.key,
        record: update.record,
    });
    push_chunks(&mut batches, WriteOperation::Update, &shared_columns, updates, max_size);

    let deletes = delta.deletes.into_iter().map(|key| BatchRow {
        record: Record::from_key(key_columns, &key),
        key,
    });
    push_chunks(&mut batches, WriteOperation::Delete, &shared_columns, deletes, max_size);

    batches
}

fn push_chunks(
    batches: &mut Vec<WriteBatch>,
    operation: WriteOperation,
    key_columns: &Arc<[String]>,
    rows: impl Iterator<Item = BatchRow>,
    max_size: usize,
) {
    let mut current = Vec::with_capacity(max_size);

    for row in rows {
        current.push(row);
        if current.len() == max_size {
            batches.push(WriteBatch::new(
                operation,
                key_columns.clone(),
                std::mem::replace(&mut current, Vec::with_capacity(max_size)),
            ));
        }
    }

    if !current.is_empty() {
        batches.push(WriteBatch::new(operation, key_columns.clone(), current));
    }
}
