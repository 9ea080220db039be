use std::collections::{HashMap, HashSet};
use std::future::Future;

use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;
use crate::merge::{BatchResult, RowFailure, WriteBatch, WriteOperation};
use crate::types::{Record, RecordKey};

/// A system the pipeline reconciles records into.
///
/// The destination is the only shared mutable resource of a run and [`Destination::write_batch`]
/// is its only write path. Each call should apply its rows atomically where the system allows it.
/// When it cannot, it must report exactly which rows failed so the run result stays accurate.
///
/// Implementations are cloned into every merge worker, so cloning should share the underlying
/// connection or state.
pub trait Destination {
    /// Returns the name of the destination kind.
    fn name() -> &'static str;

    /// Returns a stable identity of the target, used to scope run locks.
    ///
    /// Two destinations writing to the same place must return the same identity.
    fn identity(&self) -> String;

    /// Reads every record currently held by the destination.
    ///
    /// Fails with [`ErrorKind::DestinationUnavailable`] or [`ErrorKind::DestinationSchemaError`].
    fn read_existing(
        &self,
        key_columns: &[String],
    ) -> impl Future<Output = EtlResult<Vec<Record>>> + Send;

    /// Applies one batch.
    ///
    /// Row level failures are reported in the returned [`BatchResult`]. An `Err` means the call
    /// failed as a whole and no row of the batch was applied.
    fn write_batch(&self, batch: &WriteBatch) -> impl Future<Output = EtlResult<BatchResult>> + Send;
}

/// Applies `batch` to an in-process list of records.
///
/// Inserting an existing key is rejected with [`ErrorKind::ConstraintViolation`]. Updates replace
/// the stored record and insert it when the key is gone. Deleting a missing key succeeds.
/// Rows listed in `skip` are left out and not reported.
pub(crate) fn apply_to_records(
    records: &mut Vec<Record>,
    batch: &WriteBatch,
    skip: &HashSet<RecordKey>,
) -> Vec<RowFailure> {
    let mut positions: HashMap<RecordKey, usize> = records
        .iter()
        .enumerate()
        .filter_map(|(position, record)| {
            record
                .key_for(&batch.key_columns)
                .map(|key| (key, position))
        })
        .collect();

    let mut failed = Vec::new();
    let mut deleted = vec![false; records.len()];

    for row in &batch.rows {
        if skip.contains(&row.key) {
            continue;
        }

        match (batch.operation, positions.get(&row.key).copied()) {
            (WriteOperation::Insert, Some(_)) => failed.push(RowFailure {
                key: row.key.clone(),
                error: etl_error!(
                    ErrorKind::ConstraintViolation,
                    "Key already exists at the destination",
                    format!("insert of key {} conflicts with a stored record", row.key)
                ),
            }),
            (WriteOperation::Insert | WriteOperation::Update, None) => {
                positions.insert(row.key.clone(), records.len());
                records.push(row.record.clone());
                deleted.push(false);
            }
            (WriteOperation::Update, Some(position)) => {
                records[position] = row.record.clone();
            }
            (WriteOperation::Delete, Some(position)) => {
                deleted[position] = true;
                positions.remove(&row.key);
            }
            (WriteOperation::Delete, None) => {}
        }
    }

    if deleted.iter().any(|&gone| gone) {
        let mut flags = deleted.into_iter();
        records.retain(|_| !flags.next().unwrap_or(false));
    }

    failed
}
