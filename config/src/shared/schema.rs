use std::fmt;

use serde::{Deserialize, Serialize};

/// Logical type of a declared column.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    String,
    Integer,
    Float,
    Boolean,
    /// Nested JSON values, arrays or objects.
    Json,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::String => "string",
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Boolean => "boolean",
            ColumnType::Json => "json",
        };

        f.write_str(name)
    }
}

/// A column declared in the pipeline `schema`.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct ColumnSchema {
    /// Column name as it appears in source records.
    pub name: String,
    /// Expected type of non-null values.
    #[serde(rename = "type")]
    pub typ: ColumnType,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, typ: ColumnType) -> Self {
        Self {
            name: name.into(),
            typ,
        }
    }
}
