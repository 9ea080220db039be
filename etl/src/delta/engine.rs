use std::collections::HashSet;

use config::shared::{DeltaConfig, DeltaStrategy, KeyMatchPolicy};
use tracing::debug;

use crate::bail;
use crate::delta::{DeltaSet, FingerprintIndex, KeyedRecord, RecordUpdate};
use crate::error::{ErrorKind, EtlResult};
use crate::types::RecordSet;

/// Classifies every key of `source` and `destination` into inserts, updates, deletes or no-ops.
///
/// Source keys missing from the destination are inserts. Matched keys are always updates under
/// [`DeltaStrategy::PrimaryKey`] unless [`KeyMatchPolicy::Skip`] is configured, and are updates
/// under [`DeltaStrategy::FullRow`] only when their content fingerprints differ. Destination-only
/// keys become deletes when `delete_enabled` is set and are otherwise left untouched.
///
/// Both sets must have been built on the configured key columns.
pub fn compute_delta(
    source: &RecordSet,
    destination: &RecordSet,
    config: &DeltaConfig,
) -> EtlResult<DeltaSet> {
    for (side, set) in [("source", source), ("destination", destination)] {
        if set.key_columns() != config.primary_key.as_slice() {
            bail!(
                ErrorKind::SchemaMismatchError,
                "Record set was keyed on different columns",
                format!(
                    "{side} is keyed on {:?} but the delta is keyed on {:?}",
                    set.key_columns(),
                    config.primary_key
                )
            );
        }
    }

    let fingerprints = match config.strategy {
        DeltaStrategy::FullRow => {
            let mut columns: Vec<String> = source.columns().to_vec();
            columns.extend(destination.columns().iter().cloned());

            Some((
                FingerprintIndex::build(source, &columns),
                FingerprintIndex::build(destination, &columns),
            ))
        }
        DeltaStrategy::PrimaryKey => None,
    };

    let mut delta = DeltaSet::default();
    let mut visited = HashSet::with_capacity(source.len());

    for (key, record) in source.iter() {
        let Some(previous) = destination.get(key) else {
            delta.inserts.push(KeyedRecord {
                key: key.clone(),
                record: record.clone(),
            });
            continue;
        };

        visited.insert(key);

        let changed = match (&fingerprints, config.on_key_match) {
            (Some((source_index, destination_index)), _) => {
                source_index.get(key) != destination_index.get(key)
            }
            (None, KeyMatchPolicy::Update) => true,
            (None, KeyMatchPolicy::Skip) => false,
        };

        if changed {
            delta.updates.push(RecordUpdate {
                key: key.clone(),
                record: record.clone(),
                previous: previous.clone(),
            });
        } else {
            delta.unchanged += 1;
        }
    }

    for key in destination.keys() {
        if visited.contains(key) {
            continue;
        }

        if config.delete_enabled {
            delta.deletes.push(key.clone());
        } else {
            delta.retained += 1;
        }
    }

    debug!(
        inserts = delta.inserts.len(),
        updates = delta.updates.len(),
        deletes = delta.deletes.len(),
        unchanged = delta.unchanged,
        retained = delta.retained,
        "computed delta"
    );

    debug_assert!(delta.check_partition().is_ok());

    Ok(delta)
}
