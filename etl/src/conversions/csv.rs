//! CSV encoding of record files.
//!
//! The first row names the columns. Fields are typed the way JSON scalars are: `true`, `42` or
//! `1.5` become booleans and numbers, a JSON array or object becomes an opaque value, an empty
//! field is null and anything else is kept as a string.

use serde_json::Value;
use thiserror::Error;

use crate::types::{Cell, Record};

/// Errors raised while parsing or rendering a CSV record file.
#[derive(Debug, Error)]
pub enum CsvDocumentError {
    #[error("invalid CSV document: {0}")]
    Csv(#[from] ::csv::Error),

    #[error("failed to flush CSV output: {0}")]
    Flush(#[source] std::io::Error),

    #[error("CSV output is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Parses a CSV document with a header row.
pub fn parse_csv_records(text: &str) -> Result<Vec<Record>, CsvDocumentError> {
    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        records.push(Record::from_pairs(
            headers.iter().zip(row.iter()).map(|(column, field)| (column, parse_field(field))),
        ));
    }

    Ok(records)
}

/// Renders `records` as a CSV document.
///
/// The header is the union of every record's columns in first-seen order. A column a record does
/// not carry is written as an empty field. No records render as an empty document.
pub fn render_csv_records(records: &[Record]) -> Result<String, CsvDocumentError> {
    let mut header: Vec<&str> = Vec::new();
    for record in records {
        for column in record.column_names() {
            if !header.contains(&column) {
                header.push(column);
            }
        }
    }

    if header.is_empty() {
        return Ok(String::new());
    }

    let mut writer = ::csv::Writer::from_writer(Vec::new());
    writer.write_record(&header)?;
    for record in records {
        writer.write_record(header.iter().map(|column| {
            record
                .get(column)
                .map(render_field)
                .unwrap_or_default()
        }))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| CsvDocumentError::Flush(err.into_error()))?;

    Ok(String::from_utf8(bytes)?)
}

fn parse_field(field: &str) -> Cell {
    if field.is_empty() {
        return Cell::Null;
    }

    match serde_json::from_str::<Value>(field) {
        Ok(Value::String(_)) | Err(_) => Cell::String(field.to_owned()),
        Ok(value) => Cell::from(value),
    }
}

fn render_field(cell: &Cell) -> String {
    match cell {
        Cell::Null => String::new(),
        Cell::String(value) => value.clone(),
        other => other.to_json().to_string(),
    }
}
