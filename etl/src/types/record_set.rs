use std::collections::{HashMap, HashSet};

use crate::bail;
use crate::error::{ErrorKind, EtlResult};
use crate::types::{Record, RecordKey};

/// Records of one side of a run, indexed by their key.
///
/// Construction enforces that every record carries a non-null value for each key column and that
/// no two records share a key. Input order is preserved for iteration.
#[derive(Debug, Clone)]
pub struct RecordSet {
    key_columns: Vec<String>,
    entries: Vec<(RecordKey, Record)>,
    positions: HashMap<RecordKey, usize>,
    columns: Vec<String>,
}

impl RecordSet {
    /// Validates and indexes `records` by `key_columns`.
    ///
    /// Fails with [`ErrorKind::SchemaMismatchError`] when a key column is absent from every record
    /// of a non-empty set, and with [`ErrorKind::DataIntegrityError`] when a single record lacks a
    /// key value or repeats a key.
    pub fn new(records: Vec<Record>, key_columns: &[String]) -> EtlResult<Self> {
        if key_columns.is_empty() {
            bail!(
                ErrorKind::ConfigError,
                "At least one key column is required"
            );
        }

        if !records.is_empty() {
            for column in key_columns {
                if !records.iter().any(|record| record.contains(column)) {
                    bail!(
                        ErrorKind::SchemaMismatchError,
                        "Key column is not exposed by the record set",
                        format!("no record has the key column `{column}`")
                    );
                }
            }
        }

        let mut entries = Vec::with_capacity(records.len());
        let mut positions = HashMap::with_capacity(records.len());
        let mut columns = Vec::new();
        let mut seen_columns = HashSet::new();

        for (position, record) in records.into_iter().enumerate() {
            let mut cells = Vec::with_capacity(key_columns.len());
            for column in key_columns {
                match record.get(column) {
                    Some(cell) if !cell.is_null() => cells.push(cell.clone()),
                    _ => bail!(
                        ErrorKind::DataIntegrityError,
                        "Record is missing a key column value",
                        format!("record #{position} {record} has no value for key column `{column}`")
                    ),
                }
            }

            let key = RecordKey::new(cells);
            if positions.contains_key(&key) {
                bail!(
                    ErrorKind::DataIntegrityError,
                    "Duplicate key in record set",
                    format!("key {key} appears more than once")
                );
            }

            for column in record.column_names() {
                if seen_columns.insert(column.to_owned()) {
                    columns.push(column.to_owned());
                }
            }

            positions.insert(key.clone(), entries.len());
            entries.push((key, record));
        }

        Ok(Self {
            key_columns: key_columns.to_vec(),
            entries,
            positions,
            columns,
        })
    }

    pub fn key_columns(&self) -> &[String] {
        &self.key_columns
    }

    /// Union of the columns of all records, in first seen order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &RecordKey) -> Option<&Record> {
        self.positions
            .get(key)
            .map(|&position| &self.entries[position].1)
    }

    pub fn contains_key(&self, key: &RecordKey) -> bool {
        self.positions.contains_key(key)
    }

    /// Iterates over `(key, record)` pairs in input order.
    pub fn iter(&self) -> impl Iterator<Item = (&RecordKey, &Record)> {
        self.entries.iter().map(|(key, record)| (key, record))
    }

    pub fn keys(&self) -> impl Iterator<Item = &RecordKey> {
        self.entries.iter().map(|(key, _)| key)
    }

    pub fn into_records(self) -> Vec<Record> {
        self.entries.into_iter().map(|(_, record)| record).collect()
    }
}
