use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Strategy used to decide whether a row present on both sides must be rewritten.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum DeltaStrategy {
    /// Identity is decided by the key columns only, row content is never compared.
    PrimaryKey,
    /// Rows sharing a key are compared on every column through content fingerprints.
    FullRow,
}

impl DeltaStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeltaStrategy::PrimaryKey => "primary_key",
            DeltaStrategy::FullRow => "full_row",
        }
    }
}

/// What the [`DeltaStrategy::PrimaryKey`] strategy does with a key found on both sides.
///
/// The source is treated as authoritative by default, so a matched key is always rewritten.
/// [`KeyMatchPolicy::Skip`] turns the strategy into a key-existence check that only inserts
/// new keys.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum KeyMatchPolicy {
    #[default]
    Update,
    Skip,
}

/// Delta reconciliation settings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct DeltaConfig {
    /// Comparison strategy for keys present on both sides.
    pub strategy: DeltaStrategy,
    /// Ordered key columns identifying a logical row on both sides.
    pub primary_key: Vec<String>,
    /// Whether destination rows missing from the source are deleted.
    #[serde(default)]
    pub delete_enabled: bool,
    /// Behavior of [`DeltaStrategy::PrimaryKey`] on a matched key.
    #[serde(default)]
    pub on_key_match: KeyMatchPolicy,
}

impl DeltaConfig {
    /// Creates a delta configuration with deletes disabled and the default key match policy.
    pub fn new<I, S>(strategy: DeltaStrategy, primary_key: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            strategy,
            primary_key: primary_key.into_iter().map(Into::into).collect(),
            delete_enabled: false,
            on_key_match: KeyMatchPolicy::default(),
        }
    }

    /// Enables or disables deletes.
    pub fn with_delete_enabled(mut self, delete_enabled: bool) -> Self {
        self.delete_enabled = delete_enabled;
        self
    }

    /// Sets the key match policy.
    pub fn with_on_key_match(mut self, on_key_match: KeyMatchPolicy) -> Self {
        self.on_key_match = on_key_match;
        self
    }

    /// Validates the key columns.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.primary_key.is_empty() {
            return Err(ValidationError::EmptyPrimaryKey);
        }

        let mut seen = HashSet::with_capacity(self.primary_key.len());
        for column in &self.primary_key {
            if column.trim().is_empty() {
                return Err(ValidationError::BlankPrimaryKeyColumn);
            }

            if !seen.insert(column.as_str()) {
                return Err(ValidationError::DuplicatePrimaryKeyColumn(column.clone()));
            }
        }

        Ok(())
    }
}
