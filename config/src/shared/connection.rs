use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::shared::ValidationError;

/// On-disk encoding of a local file connection.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    /// A single JSON document holding an array of objects.
    Json,
    /// One JSON object per line.
    Jsonl,
    /// Comma separated values with a header row naming the columns.
    Csv,
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileType::Json => f.write_str("json"),
            FileType::Jsonl => f.write_str("jsonl"),
            FileType::Csv => f.write_str("csv"),
        }
    }
}

/// Descriptor of a system records are read from or written to.
///
/// The `type` field selects the variant. The core never inspects these fields, they are handed
/// to the adapter implementing the matching capability.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConnectionConfig {
    /// Records stored in a file on the local filesystem.
    LocalFile {
        /// Path of the file.
        path: PathBuf,
        /// Encoding of the file.
        file_type: FileType,
        /// Dotted path to the array of records inside a [`FileType::Json`] document.
        #[serde(default)]
        data_key: Option<String>,
    },
    /// Records held in memory, seeded from the configuration.
    ///
    /// Values pass through the layered configuration loader, which has no unsigned integer type:
    /// integers above `i64::MAX` come back as floats. Use a local file connection to carry them
    /// exactly.
    Memory {
        #[serde(default)]
        records: Vec<Map<String, Value>>,
    },
}

impl ConnectionConfig {
    /// Returns the name of the connection type, as written in the `type` field.
    pub fn type_name(&self) -> &'static str {
        match self {
            ConnectionConfig::LocalFile { .. } => "local_file",
            ConnectionConfig::Memory { .. } => "memory",
        }
    }

    /// Validates the connection settings. `role` is used to name the offending field.
    pub fn validate(&self, role: &str) -> Result<(), ValidationError> {
        match self {
            ConnectionConfig::LocalFile {
                path,
                file_type,
                data_key,
            } => {
                if path.as_os_str().is_empty() {
                    return Err(ValidationError::InvalidFieldValue {
                        field: format!("{role}.path"),
                        constraint: "must not be empty".to_string(),
                    });
                }

                if let Some(data_key) = data_key {
                    if *file_type != FileType::Json {
                        return Err(ValidationError::InvalidFieldValue {
                            field: format!("{role}.data_key"),
                            constraint: format!("is not supported for `{file_type}` files"),
                        });
                    }

                    if data_key.split('.').any(|segment| segment.is_empty()) {
                        return Err(ValidationError::InvalidFieldValue {
                            field: format!("{role}.data_key"),
                            constraint: "must not contain empty segments".to_string(),
                        });
                    }
                }

                Ok(())
            }
            ConnectionConfig::Memory { .. } => Ok(()),
        }
    }
}
