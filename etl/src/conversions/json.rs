//! JSON encodings of record files.
//!
//! A `json` file holds an array of objects, either at the top level or nested under a dotted
//! `data_key` path such as `response.items`. A `jsonl` file holds one object per line.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::types::Record;

/// Errors raised while parsing or rendering a JSON record file.
#[derive(Debug, Error)]
pub enum JsonDocumentError {
    #[error("invalid JSON document: {0}")]
    Syntax(#[from] serde_json::Error),

    #[error("invalid JSON on line {line}: {source}")]
    Line {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("data key segment `{0}` is missing")]
    MissingDataKey(String),

    #[error("data key segment `{0}` does not point inside an object")]
    DataKeyNotObject(String),

    #[error("expected an array of objects")]
    NotAnArray,

    #[error("element {0} of the array is not an object")]
    RowNotObject(usize),
}

/// Parses a `json` document, reading the array at `data_key` when one is given.
pub fn parse_json_records(
    text: &str,
    data_key: Option<&str>,
) -> Result<Vec<Record>, JsonDocumentError> {
    let Some(data_key) = data_key else {
        return Ok(serde_json::from_str::<Vec<Record>>(text)?);
    };

    let document: Value = serde_json::from_str(text)?;
    let mut current = &document;
    for segment in data_key.split('.') {
        let Value::Object(object) = current else {
            return Err(JsonDocumentError::DataKeyNotObject(segment.to_owned()));
        };
        current = object
            .get(segment)
            .ok_or_else(|| JsonDocumentError::MissingDataKey(segment.to_owned()))?;
    }

    let Value::Array(rows) = current else {
        return Err(JsonDocumentError::NotAnArray);
    };

    rows.iter()
        .enumerate()
        .map(|(index, row)| match row {
            Value::Object(object) => Ok(Record::from(object.clone())),
            _ => Err(JsonDocumentError::RowNotObject(index)),
        })
        .collect()
}

/// Parses a `jsonl` document. Blank lines are skipped.
pub fn parse_jsonl_records(text: &str) -> Result<Vec<Record>, JsonDocumentError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str::<Record>(line).map_err(|source| JsonDocumentError::Line {
                line: index + 1,
                source,
            })
        })
        .collect()
}

/// Renders `records` as a `json` document.
///
/// With a `data_key`, the records replace the array at that path inside `existing` and the rest of
/// the document is kept. Missing intermediate objects are created.
pub fn render_json_records(
    records: &[Record],
    data_key: Option<&str>,
    existing: Option<&str>,
) -> Result<String, JsonDocumentError> {
    let Some(data_key) = data_key else {
        return Ok(format!("{}\n", serde_json::to_string_pretty(records)?));
    };

    let mut document = match existing {
        Some(text) if !text.trim().is_empty() => serde_json::from_str(text)?,
        _ => Value::Object(Map::new()),
    };

    let rows = Value::Array(records.iter().map(Record::to_json).collect());
    set_path(&mut document, data_key, rows)?;

    Ok(format!("{}\n", serde_json::to_string_pretty(&document)?))
}

/// Renders `records` as a `jsonl` document.
pub fn render_jsonl_records(records: &[Record]) -> Result<String, JsonDocumentError> {
    let mut rendered = String::new();
    for record in records {
        rendered.push_str(&serde_json::to_string(record)?);
        rendered.push('\n');
    }
    Ok(rendered)
}

fn set_path(document: &mut Value, data_key: &str, rows: Value) -> Result<(), JsonDocumentError> {
    let mut segments = data_key.split('.').peekable();
    let mut current = document;

    while let Some(segment) = segments.next() {
        let Value::Object(object) = current else {
            return Err(JsonDocumentError::DataKeyNotObject(segment.to_owned()));
        };

        if segments.peek().is_none() {
            object.insert(segment.to_owned(), rows);
            return Ok(());
        }

        current = object
            .entry(segment.to_owned())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    Ok(())
}
