use std::collections::HashMap;

use sha2::{Digest, Sha256};

use crate::types::{Cell, Record, RecordKey, RecordSet};

/// SHA-256 digest of a record's full content.
pub type Fingerprint = [u8; 32];

/// Computes the content fingerprint of `record` over `columns`.
///
/// `columns` must be sorted so that the digest does not depend on the record's own column order.
/// Columns the record does not carry are hashed as null. Every value is prefixed with a type tag
/// and every variable length field with its length, so distinct contents cannot collide through
/// concatenation.
pub fn fingerprint(record: &Record, columns: &[String]) -> Fingerprint {
    let mut hasher = Sha256::new();

    for column in columns {
        hash_bytes(&mut hasher, column.as_bytes());
        hash_cell(&mut hasher, record.cell_or_null(column));
    }

    hasher.finalize().into()
}

fn hash_bytes(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

fn hash_cell(hasher: &mut Sha256, cell: &Cell) {
    match cell {
        Cell::Null => hasher.update([0]),
        Cell::Bool(v) => hasher.update([1, u8::from(*v)]),
        Cell::I64(v) => {
            hasher.update([2]);
            hasher.update(v.to_le_bytes());
        }
        Cell::U64(v) => {
            hasher.update([3]);
            hasher.update(v.to_le_bytes());
        }
        Cell::F64(v) => {
            hasher.update([4]);
            hasher.update(v.to_bits().to_le_bytes());
        }
        Cell::String(v) => {
            hasher.update([5]);
            hash_bytes(hasher, v.as_bytes());
        }
        Cell::Json(v) => {
            hasher.update([6]);
            hash_bytes(hasher, v.to_string().as_bytes());
        }
    }
}

/// Fingerprints of every record of a [`RecordSet`], keyed by record key.
#[derive(Debug, Clone)]
pub struct FingerprintIndex {
    columns: Vec<String>,
    fingerprints: HashMap<RecordKey, Fingerprint>,
}

impl FingerprintIndex {
    /// Fingerprints every record of `set` over `columns`, which are sorted and deduplicated first.
    pub fn build(set: &RecordSet, columns: &[String]) -> Self {
        let mut columns = columns.to_vec();
        columns.sort_unstable();
        columns.dedup();

        let fingerprints = set
            .iter()
            .map(|(key, record)| (key.clone(), fingerprint(record, &columns)))
            .collect();

        Self {
            columns,
            fingerprints,
        }
    }

    pub fn get(&self, key: &RecordKey) -> Option<&Fingerprint> {
        self.fingerprints.get(key)
    }

    /// Sorted columns the fingerprints were computed over.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }
}
