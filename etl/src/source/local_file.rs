use std::io;
use std::path::PathBuf;

use config::shared::FileType;
use tracing::info;

use crate::conversions::parse_records;
use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;
use crate::source::SourceReader;
use crate::types::Record;

/// Source reading a JSON, JSONL or CSV file from the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalFileSource {
    path: PathBuf,
    file_type: FileType,
    data_key: Option<String>,
}

impl LocalFileSource {
    pub fn new(path: impl Into<PathBuf>, file_type: FileType, data_key: Option<String>) -> Self {
        Self {
            path: path.into(),
            file_type,
            data_key,
        }
    }
}

impl SourceReader for LocalFileSource {
    fn name() -> &'static str {
        "local_file"
    }

    async fn fetch(&self) -> EtlResult<Vec<Record>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::InvalidData => {
                return Err(etl_error!(
                    ErrorKind::SourceSchemaError,
                    "Source file is not valid UTF-8",
                    format!("{}: {err}", self.path.display()),
                    source: err
                ));
            }
            Err(err) => {
                return Err(etl_error!(
                    ErrorKind::SourceUnavailable,
                    "Failed to read source file",
                    format!("{}: {err}", self.path.display()),
                    source: err
                ));
            }
        };

        let records = parse_records(&text, self.file_type, self.data_key.as_deref()).map_err(
            |err| {
                etl_error!(
                    ErrorKind::SourceSchemaError,
                    "Source file does not hold records",
                    format!("{}: {err}", self.path.display()),
                    source: err
                )
            },
        )?;

        info!(
            path = %self.path.display(),
            records = records.len(),
            "fetched source records"
        );

        Ok(records)
    }
}
