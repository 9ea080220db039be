use std::collections::HashSet;

use serde::Serialize;

use crate::bail;
use crate::error::{ErrorKind, EtlResult};
use crate::types::{Record, RecordKey};

/// A source record together with its key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyedRecord {
    pub key: RecordKey,
    pub record: Record,
}

/// A record present on both sides that must be rewritten.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordUpdate {
    pub key: RecordKey,
    /// Source version, written to the destination.
    pub record: Record,
    /// Destination version being replaced.
    pub previous: Record,
}

/// Changes needed to bring the destination in line with the source.
///
/// A key appears in at most one of `inserts`, `updates` and `deletes`. Entries keep the order in
/// which their records were read, so computing the delta twice over the same input yields an
/// identical value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeltaSet {
    pub inserts: Vec<KeyedRecord>,
    pub updates: Vec<RecordUpdate>,
    pub deletes: Vec<RecordKey>,
    /// Matched keys that need no write.
    pub unchanged: usize,
    /// Destination-only keys left in place because deletes are disabled.
    pub retained: usize,
}

impl DeltaSet {
    /// Returns `true` when nothing has to be written.
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }

    /// Number of writes the delta holds.
    pub fn len(&self) -> usize {
        self.inserts.len() + self.updates.len() + self.deletes.len()
    }

    pub fn insert_keys(&self) -> impl Iterator<Item = &RecordKey> {
        self.inserts.iter().map(|insert| &insert.key)
    }

    pub fn update_keys(&self) -> impl Iterator<Item = &RecordKey> {
        self.updates.iter().map(|update| &update.key)
    }

    /// Checks that no key is classified twice.
    pub fn check_partition(&self) -> EtlResult<()> {
        let mut seen = HashSet::with_capacity(self.len());

        for key in self
            .insert_keys()
            .chain(self.update_keys())
            .chain(self.deletes.iter())
        {
            if !seen.insert(key) {
                bail!(
                    ErrorKind::InvalidState,
                    "Key classified more than once in delta",
                    format!("key {key} appears in more than one change list")
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Cell;

    fn key(id: i64) -> RecordKey {
        RecordKey::new(vec![Cell::I64(id)])
    }

    #[test]
    fn disjoint_delta_passes_partition_check() {
        let delta = DeltaSet {
            inserts: vec![KeyedRecord {
                key: key(1),
                record: Record::from_pairs([("id", 1)]),
            }],
            deletes: vec![key(2)],
            ..Default::default()
        };

        assert!(delta.check_partition().is_ok());
        assert_eq!(delta.len(), 2);
        assert!(!delta.is_empty());
    }

    #[test]
    fn overlapping_delta_fails_partition_check() {
        let delta = DeltaSet {
            updates: vec![RecordUpdate {
                key: key(1),
                record: Record::from_pairs([("id", 1)]),
                previous: Record::from_pairs([("id", 1)]),
            }],
            deletes: vec![key(1)],
            ..Default::default()
        };

        let err = delta.check_partition().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }
}
