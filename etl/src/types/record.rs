use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::types::{Cell, RecordKey};

static NULL_CELL: Cell = Cell::Null;

/// One row of a source or destination, as ordered `(column, value)` pairs.
///
/// Column order is kept as read so that rewritten files look like their input. Equality ignores
/// column order.
#[derive(Debug, Clone, Default)]
pub struct Record {
    columns: Vec<(String, Cell)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a record from `(column, value)` pairs. Later duplicates replace earlier values.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Cell>,
    {
        let mut record = Self::new();
        for (column, value) in pairs {
            record.insert(column, value);
        }
        record
    }

    /// Sets a column, replacing its value in place if the column already exists.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Cell>) {
        let column = column.into();
        let value = value.into();

        match self.columns.iter_mut().find(|(name, _)| *name == column) {
            Some((_, existing)) => *existing = value,
            None => self.columns.push((column, value)),
        }
    }

    /// Returns the value of a column, or `None` when the record does not carry it.
    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, cell)| cell)
    }

    /// Returns the value of a column, treating an absent column as null.
    pub fn cell_or_null(&self, column: &str) -> &Cell {
        self.get(column).unwrap_or(&NULL_CELL)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    /// Iterates over column names in record order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.columns.iter().map(|(name, cell)| (name.as_str(), cell))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Extracts the key of this record, or `None` when a key column is absent or null.
    pub fn key_for(&self, key_columns: &[String]) -> Option<RecordKey> {
        key_columns
            .iter()
            .map(|column| self.get(column).filter(|cell| !cell.is_null()).cloned())
            .collect::<Option<Vec<_>>>()
            .map(RecordKey::new)
    }

    /// Builds a record holding only the key columns with the values of `key`.
    pub fn from_key(key_columns: &[String], key: &RecordKey) -> Self {
        Self {
            columns: key_columns
                .iter()
                .cloned()
                .zip(key.cells().iter().cloned())
                .collect(),
        }
    }

    /// Converts the record into a JSON object.
    pub fn to_json(&self) -> Value {
        let object: Map<String, Value> = self
            .columns
            .iter()
            .map(|(name, cell)| (name.clone(), cell.to_json()))
            .collect();
        Value::Object(object)
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(column, cell)| other.get(column) == Some(cell))
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (index, (column, cell)) in self.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{column}: {cell}")?;
        }
        f.write_str("}")
    }
}

impl From<Map<String, Value>> for Record {
    fn from(object: Map<String, Value>) -> Self {
        Self::from_pairs(object.into_iter().map(|(k, v)| (k, Cell::from(v))))
    }
}

impl<K: Into<String>, V: Into<Cell>> FromIterator<(K, V)> for Record {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self::from_pairs(iter)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, cell) in &self.columns {
            map.serialize_entry(column, cell)?;
        }
        map.end()
    }
}

struct RecordVisitor;

impl<'de> Visitor<'de> for RecordVisitor {
    type Value = Record;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a JSON object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut record = Record {
            columns: Vec::with_capacity(access.size_hint().unwrap_or(0)),
        };

        while let Some((column, cell)) = access.next_entry::<String, Cell>()? {
            record.insert(column, cell);
        }

        Ok(record)
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(RecordVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialization_keeps_column_order() {
        let record: Record = serde_json::from_str(r#"{"z": 1, "a": "x", "m": null}"#).unwrap();

        assert_eq!(record.column_names().collect::<Vec<_>>(), ["z", "a", "m"]);
        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            r#"{"z":1,"a":"x","m":null}"#
        );
    }

    #[test]
    fn equality_ignores_column_order() {
        let a = Record::from_pairs([("id", Cell::I64(1)), ("val", Cell::from("x"))]);
        let b = Record::from_pairs([("val", Cell::from("x")), ("id", Cell::I64(1))]);
        assert_eq!(a, b);
    }

    #[test]
    fn absent_columns_read_as_null() {
        let record = Record::from_pairs([("id", 1)]);
        assert_eq!(record.get("val"), None);
        assert_eq!(record.cell_or_null("val"), &Cell::Null);
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut record = Record::from_pairs([("id", 1), ("val", 2)]);
        record.insert("id", 9);
        assert_eq!(record.column_names().collect::<Vec<_>>(), ["id", "val"]);
        assert_eq!(record.get("id"), Some(&Cell::I64(9)));
    }

    #[test]
    fn key_extraction_requires_every_key_column() {
        let columns = vec!["id".to_owned(), "region".to_owned()];
        let full = Record::from_pairs([("id", Cell::I64(1)), ("region", Cell::from("eu"))]);
        let partial = Record::from_pairs([("id", Cell::I64(1)), ("region", Cell::Null)]);

        assert_eq!(
            full.key_for(&columns),
            Some(RecordKey::new(vec![Cell::I64(1), Cell::from("eu")]))
        );
        assert_eq!(partial.key_for(&columns), None);
    }

    #[test]
    fn key_only_record() {
        let columns = vec!["id".to_owned(), "region".to_owned()];
        let key = RecordKey::new(vec![Cell::I64(4), Cell::from("eu")]);
        let record = Record::from_key(&columns, &key);
        assert_eq!(record.to_string(), "{id: 4, region: \"eu\"}");
    }
}
