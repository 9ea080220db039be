//! Checks of fetched records against a declared column schema.

use std::collections::{BTreeSet, HashSet};

use config::shared::{ColumnSchema, ColumnType};

use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::etl_error;
use crate::types::{Cell, Record};

/// Returns `true` if `cell` can be stored in a column declared as `typ`.
///
/// Nulls fit every type and integers fit float columns.
pub fn cell_matches(cell: &Cell, typ: ColumnType) -> bool {
    match (cell, typ) {
        (Cell::Null, _) => true,
        (Cell::Bool(_), ColumnType::Boolean) => true,
        (Cell::I64(_) | Cell::U64(_), ColumnType::Integer | ColumnType::Float) => true,
        (Cell::F64(_), ColumnType::Float) => true,
        (Cell::String(_), ColumnType::String) => true,
        (Cell::Json(_), ColumnType::Json) => true,
        _ => false,
    }
}

/// Checks that `records` expose exactly the declared columns with compatible values.
///
/// The union of the record columns must equal the declared names. Every mismatch is collected and
/// reported at once as [`ErrorKind::SchemaMismatchError`].
pub fn check_declared_schema(records: &[Record], schema: &[ColumnSchema]) -> EtlResult<()> {
    let declared: HashSet<&str> = schema.iter().map(|column| column.name.as_str()).collect();
    let mut seen = HashSet::new();
    let mut undeclared = BTreeSet::new();
    let mut errors: Vec<EtlError> = Vec::new();

    for (index, record) in records.iter().enumerate() {
        for (column, _) in record.iter() {
            seen.insert(column);
            if !declared.contains(column) {
                undeclared.insert(column.to_owned());
            }
        }

        for column in schema {
            if let Some(cell) = record.get(&column.name)
                && !cell_matches(cell, column.typ)
            {
                errors.push(etl_error!(
                    ErrorKind::SchemaMismatchError,
                    "Value does not match the declared column type",
                    format!(
                        "record #{index}: column `{}` is declared as {} but holds {} {cell}",
                        column.name,
                        column.typ,
                        cell.type_name()
                    )
                ));
            }
        }
    }

    if !undeclared.is_empty() {
        let columns: Vec<_> = undeclared.into_iter().collect();
        errors.push(etl_error!(
            ErrorKind::SchemaMismatchError,
            "Source exposes columns missing from the declared schema",
            columns.join(", ")
        ));
    }

    if !records.is_empty() {
        let missing: Vec<&str> = schema
            .iter()
            .map(|column| column.name.as_str())
            .filter(|name| !seen.contains(name))
            .collect();

        if !missing.is_empty() {
            errors.push(etl_error!(
                ErrorKind::SchemaMismatchError,
                "Declared columns are missing from the source",
                missing.join(", ")
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Vec<ColumnSchema> {
        vec![
            ColumnSchema::new("id", ColumnType::Integer),
            ColumnSchema::new("score", ColumnType::Float),
            ColumnSchema::new("name", ColumnType::String),
        ]
    }

    #[test]
    fn matching_records_pass() {
        let records = vec![
            Record::from_pairs([
                ("id", Cell::I64(1)),
                ("score", Cell::I64(3)),
                ("name", Cell::from("a")),
            ]),
            Record::from_pairs([
                ("id", Cell::I64(2)),
                ("score", Cell::F64(2.5)),
                ("name", Cell::Null),
            ]),
        ];

        assert!(check_declared_schema(&records, &schema()).is_ok());
    }

    #[test]
    fn wrong_value_type_is_a_mismatch() {
        let records = vec![Record::from_pairs([
            ("id", Cell::from("1")),
            ("score", Cell::F64(1.0)),
            ("name", Cell::from("a")),
        ])];

        let err = check_declared_schema(&records, &schema()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaMismatchError);
        assert!(err.detail().unwrap().contains("`id`"));
    }

    #[test]
    fn extra_and_missing_columns_are_reported_together() {
        let records = vec![Record::from_pairs([
            ("id", Cell::I64(1)),
            ("score", Cell::F64(1.0)),
            ("extra", Cell::Bool(true)),
        ])];

        let err = check_declared_schema(&records, &schema()).unwrap_err();
        assert_eq!(err.errors().len(), 2);
        assert!(
            err.kinds()
                .iter()
                .all(|kind| *kind == ErrorKind::SchemaMismatchError)
        );
    }

    #[test]
    fn empty_source_passes() {
        assert!(check_declared_schema(&[], &schema()).is_ok());
    }
}
