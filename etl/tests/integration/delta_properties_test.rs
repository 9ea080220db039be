use std::collections::BTreeMap;

use config::shared::{ApplyConfig, DeltaConfig, DeltaStrategy, KeyMatchPolicy};
use etl::delta::compute_delta;
use etl::destination::memory::MemoryDestination;
use etl::merge::MergeExecutor;
use etl::test_utils::records::{id_columns, id_val};
use etl::types::{Record, RecordSet};
use proptest::prelude::*;

fn records(rows: &BTreeMap<i64, String>) -> Vec<Record> {
    rows.iter().map(|(id, val)| id_val(*id, val)).collect()
}

fn record_set(rows: &BTreeMap<i64, String>) -> RecordSet {
    RecordSet::new(records(rows), &id_columns()).unwrap()
}

fn side() -> impl Strategy<Value = BTreeMap<i64, String>> {
    prop::collection::btree_map(0i64..24, "[a-c]{1,2}", 0..12)
}

fn strategies() -> impl Strategy<Value = (DeltaStrategy, KeyMatchPolicy)> {
    prop_oneof![
        Just((DeltaStrategy::FullRow, KeyMatchPolicy::Update)),
        Just((DeltaStrategy::PrimaryKey, KeyMatchPolicy::Update)),
        Just((DeltaStrategy::PrimaryKey, KeyMatchPolicy::Skip)),
    ]
}

proptest! {
    #[test]
    fn delta_partitions_every_key(
        source in side(),
        destination in side(),
        (strategy, on_key_match) in strategies(),
        delete_enabled in any::<bool>(),
    ) {
        let config = DeltaConfig::new(strategy, ["id"])
            .with_delete_enabled(delete_enabled)
            .with_on_key_match(on_key_match);

        let delta = compute_delta(&record_set(&source), &record_set(&destination), &config).unwrap();

        prop_assert!(delta.check_partition().is_ok());

        let matched = source.keys().filter(|id| destination.contains_key(id)).count();
        let destination_only = destination.len() - matched;

        prop_assert_eq!(delta.inserts.len(), source.len() - matched);
        prop_assert_eq!(delta.updates.len() + delta.unchanged, matched);
        prop_assert_eq!(delta.deletes.len() + delta.retained, destination_only);
        if !delete_enabled {
            prop_assert!(delta.deletes.is_empty());
        }
    }

    #[test]
    fn delta_is_deterministic(
        source in side(),
        destination in side(),
        (strategy, on_key_match) in strategies(),
    ) {
        let config = DeltaConfig::new(strategy, ["id"])
            .with_delete_enabled(true)
            .with_on_key_match(on_key_match);

        let first = compute_delta(&record_set(&source), &record_set(&destination), &config).unwrap();
        let second = compute_delta(&record_set(&source), &record_set(&destination), &config).unwrap();

        prop_assert_eq!(first, second);
    }

    #[test]
    fn applying_a_full_row_delta_converges(
        source in side(),
        destination in side(),
        delete_enabled in any::<bool>(),
    ) {
        let config = DeltaConfig::new(DeltaStrategy::FullRow, ["id"])
            .with_delete_enabled(delete_enabled);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let target = MemoryDestination::with_records(records(&destination));
        let executor = MergeExecutor::new(target.clone(), id_columns(), ApplyConfig::default());

        let delta = compute_delta(&record_set(&source), &record_set(&destination), &config).unwrap();
        let result = runtime.block_on(executor.apply(delta, None));
        prop_assert!(result.is_success());

        let applied = runtime.block_on(target.records());
        let applied = RecordSet::new(applied, &id_columns()).unwrap();
        let again = compute_delta(&record_set(&source), &applied, &config).unwrap();

        prop_assert!(again.is_empty());
        prop_assert_eq!(again.unchanged, source.len());
    }
}
