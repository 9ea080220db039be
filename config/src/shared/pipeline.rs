use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::shared::{ApplyConfig, ColumnSchema, ConnectionConfig, DeltaConfig, ValidationError};

/// Configuration of a single pipeline run.
///
/// Built once at load time and never mutated afterwards. Every component of a run reads from the
/// same validated instance.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    /// Where source records are read from.
    pub source: ConnectionConfig,
    /// Where records are reconciled into.
    pub destination: ConnectionConfig,
    /// Delta reconciliation settings.
    pub delta: DeltaConfig,
    /// Settings for writing the computed delta.
    #[serde(default)]
    pub apply: ApplyConfig,
    /// Optional declared columns the source must expose.
    #[serde(default)]
    pub schema: Option<Vec<ColumnSchema>>,
}

impl PipelineConfig {
    /// Creates a configuration with default apply settings and no declared schema.
    pub fn new(source: ConnectionConfig, destination: ConnectionConfig, delta: DeltaConfig) -> Self {
        Self {
            source,
            destination,
            delta,
            apply: ApplyConfig::default(),
            schema: None,
        }
    }

    /// Returns the ordered key columns.
    pub fn key_columns(&self) -> &[String] {
        &self.delta.primary_key
    }

    /// Validates the whole configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.source.validate("source")?;
        self.destination.validate("destination")?;
        self.delta.validate()?;
        self.apply.validate()?;

        if let Some(schema) = &self.schema {
            let mut declared = HashSet::with_capacity(schema.len());
            for column in schema {
                if !declared.insert(column.name.as_str()) {
                    return Err(ValidationError::DuplicateSchemaColumn(column.name.clone()));
                }
            }

            for key_column in &self.delta.primary_key {
                if !declared.contains(key_column.as_str()) {
                    return Err(ValidationError::KeyColumnNotInSchema(key_column.clone()));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::{ColumnType, DeltaStrategy};

    fn memory() -> ConnectionConfig {
        ConnectionConfig::Memory { records: vec![] }
    }

    #[test]
    fn parses_minimal_config() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{
                "source": {"type": "memory"},
                "destination": {"type": "local_file", "path": "out.jsonl", "file_type": "jsonl"},
                "delta": {"strategy": "full_row", "primary_key": ["id"], "delete_enabled": true}
            }"#,
        )
        .unwrap();

        assert_eq!(config.delta.strategy, DeltaStrategy::FullRow);
        assert!(config.delta.delete_enabled);
        assert_eq!(config.apply, ApplyConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_key_column_missing_from_schema() {
        let mut config = PipelineConfig::new(
            memory(),
            memory(),
            DeltaConfig::new(DeltaStrategy::FullRow, ["id"]),
        );
        config.schema = Some(vec![ColumnSchema::new("name", ColumnType::String)]);

        assert_eq!(
            config.validate(),
            Err(ValidationError::KeyColumnNotInSchema("id".to_string()))
        );
    }

    #[test]
    fn rejects_duplicate_schema_columns() {
        let mut config = PipelineConfig::new(
            memory(),
            memory(),
            DeltaConfig::new(DeltaStrategy::FullRow, ["id"]),
        );
        config.schema = Some(vec![
            ColumnSchema::new("id", ColumnType::Integer),
            ColumnSchema::new("id", ColumnType::String),
        ]);

        assert_eq!(
            config.validate(),
            Err(ValidationError::DuplicateSchemaColumn("id".to_string()))
        );
    }
}
