use config::shared::{ConnectionConfig, DeltaConfig, DeltaStrategy, PipelineConfig};

use crate::types::{Cell, Record, RecordKey};

/// Builds `{id, val}` records, the shape most tests reconcile.
pub fn id_val(id: i64, val: &str) -> Record {
    Record::from_pairs([("id", Cell::I64(id)), ("val", Cell::from(val))])
}

/// Builds `{id, val}` records for every pair.
pub fn id_vals(rows: &[(i64, &str)]) -> Vec<Record> {
    rows.iter().map(|&(id, val)| id_val(id, val)).collect()
}

/// Builds the key of an `id` keyed record.
pub fn id_key(id: i64) -> RecordKey {
    RecordKey::new(vec![Cell::I64(id)])
}

/// Returns the `id` column as the only key column.
pub fn id_columns() -> Vec<String> {
    vec!["id".to_owned()]
}

/// Builds a memory to memory pipeline configuration keyed on `id`.
///
/// The connection descriptors are placeholders, tests hand adapters to the pipeline directly.
pub fn memory_pipeline_config(strategy: DeltaStrategy, delete_enabled: bool) -> PipelineConfig {
    let mut config = PipelineConfig::new(
        ConnectionConfig::Memory { records: vec![] },
        ConnectionConfig::Memory { records: vec![] },
        DeltaConfig::new(strategy, ["id"]).with_delete_enabled(delete_enabled),
    );

    // Tests never wait on real backoff delays.
    config.apply.retry.initial_retry_delay_ms = 1;
    config.apply.retry.max_retry_delay_ms = 5;

    config
}

/// Returns records sorted by their `id` column, for order independent assertions.
pub fn sorted_by_id(mut records: Vec<Record>) -> Vec<Record> {
    records.sort_by_key(|record| match record.get("id") {
        Some(Cell::I64(id)) => *id,
        _ => i64::MIN,
    });
    records
}
