use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// `delta.primary_key` must name at least one column.
    #[error("`delta.primary_key` must contain at least one column")]
    EmptyPrimaryKey,
    /// A key column appears more than once in `delta.primary_key`.
    #[error("`delta.primary_key` contains the column `{0}` more than once")]
    DuplicatePrimaryKeyColumn(String),
    /// A key column name is empty or only whitespace.
    #[error("`delta.primary_key` contains a blank column name")]
    BlankPrimaryKeyColumn,
    /// A declared schema lists the same column twice.
    #[error("`schema` declares the column `{0}` more than once")]
    DuplicateSchemaColumn(String),
    /// A key column is not part of the declared schema.
    #[error("key column `{0}` is not declared in `schema`")]
    KeyColumnNotInSchema(String),
    /// A field holds a value outside of its allowed range.
    #[error("invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
}
