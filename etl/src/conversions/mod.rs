//! Reading and writing record files.

use config::shared::FileType;
use thiserror::Error;

use crate::types::Record;

pub mod csv;
pub mod json;

use self::csv::{CsvDocumentError, parse_csv_records, render_csv_records};
use self::json::{
    JsonDocumentError, parse_json_records, parse_jsonl_records, render_json_records,
    render_jsonl_records,
};

/// Errors raised while parsing or rendering a record file of any [`FileType`].
#[derive(Debug, Error)]
pub enum RecordFileError {
    #[error(transparent)]
    Json(#[from] JsonDocumentError),

    #[error(transparent)]
    Csv(#[from] CsvDocumentError),
}

/// Parses the records held by `text`. Blank text holds no records.
///
/// `data_key` only applies to [`FileType::Json`].
pub fn parse_records(
    text: &str,
    file_type: FileType,
    data_key: Option<&str>,
) -> Result<Vec<Record>, RecordFileError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let records = match file_type {
        FileType::Json => parse_json_records(text, data_key)?,
        FileType::Jsonl => parse_jsonl_records(text)?,
        FileType::Csv => parse_csv_records(text)?,
    };

    Ok(records)
}

/// Renders `records` into file contents. `existing` is the current file text, used to keep the
/// document around a [`FileType::Json`] `data_key`.
pub fn render_records(
    records: &[Record],
    file_type: FileType,
    data_key: Option<&str>,
    existing: Option<&str>,
) -> Result<String, RecordFileError> {
    let rendered = match file_type {
        FileType::Json => render_json_records(records, data_key, existing)?,
        FileType::Jsonl => render_jsonl_records(records)?,
        FileType::Csv => render_csv_records(records)?,
    };

    Ok(rendered)
}
