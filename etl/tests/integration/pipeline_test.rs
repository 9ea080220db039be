use std::time::Duration;

use config::shared::{ColumnSchema, ColumnType, DeltaStrategy, KeyMatchPolicy};
use etl::destination::Destination;
use etl::destination::memory::MemoryDestination;
use etl::error::ErrorKind;
use etl::lock::{MemoryRunLocks, RunLocks};
use etl::pipeline::Pipeline;
use etl::source::memory::MemorySource;
use etl::test_utils::records::{id_key, id_vals, memory_pipeline_config, sorted_by_id};
use etl::test_utils::test_destination_wrapper::TestDestinationWrapper;
use etl::types::{Cell, Record};
use telemetry::tracing::init_test_tracing;

#[tokio::test(flavor = "multi_thread")]
async fn empty_destination_receives_every_source_row() {
    init_test_tracing();

    let destination = MemoryDestination::new();
    let pipeline = Pipeline::new(
        memory_pipeline_config(DeltaStrategy::FullRow, false),
        MemorySource::new(id_vals(&[(1, "a"), (2, "b")])),
        destination.clone(),
        MemoryRunLocks::new(),
    );

    let result = pipeline.run().await.unwrap();

    assert!(result.is_success());
    assert_eq!(
        (result.inserted, result.updated, result.deleted),
        (2, 0, 0)
    );
    assert_eq!(
        sorted_by_id(destination.records().await),
        id_vals(&[(1, "a"), (2, "b")])
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn full_row_rewrites_changed_rows_only() {
    init_test_tracing();

    let destination = MemoryDestination::with_records(id_vals(&[(1, "x"), (2, "same")]));
    let pipeline = Pipeline::new(
        memory_pipeline_config(DeltaStrategy::FullRow, false),
        MemorySource::new(id_vals(&[(1, "y"), (2, "same")])),
        destination.clone(),
        MemoryRunLocks::new(),
    );

    let result = pipeline.run().await.unwrap();

    assert_eq!(result.updated, 1);
    assert_eq!(result.unchanged, 1);
    assert_eq!(
        sorted_by_id(destination.records().await),
        id_vals(&[(1, "y"), (2, "same")])
    );

    // A second run has nothing left to do.
    let batches_before = destination.batches().await.len();
    let rerun = pipeline.run().await.unwrap();

    assert_eq!(rerun.applied(), 0);
    assert_eq!(rerun.unchanged, 2);
    assert_eq!(destination.batches().await.len(), batches_before);
}

#[tokio::test(flavor = "multi_thread")]
async fn identical_sides_write_nothing_under_full_row() {
    init_test_tracing();

    let destination = MemoryDestination::with_records(id_vals(&[(1, "x")]));
    let pipeline = Pipeline::new(
        memory_pipeline_config(DeltaStrategy::FullRow, true),
        MemorySource::new(id_vals(&[(1, "x")])),
        destination.clone(),
        MemoryRunLocks::new(),
    );

    let result = pipeline.run().await.unwrap();

    assert!(result.is_success());
    assert_eq!(result.applied(), 0);
    assert!(destination.batches().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn primary_key_strategy_rewrites_identical_rows() {
    init_test_tracing();

    let destination = MemoryDestination::with_records(id_vals(&[(1, "x")]));
    let pipeline = Pipeline::new(
        memory_pipeline_config(DeltaStrategy::PrimaryKey, false),
        MemorySource::new(id_vals(&[(1, "x")])),
        destination.clone(),
        MemoryRunLocks::new(),
    );

    let result = pipeline.run().await.unwrap();

    assert_eq!(result.updated, 1);
    assert_eq!(destination.batches().await.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn skip_policy_only_inserts_new_keys() {
    init_test_tracing();

    let mut config = memory_pipeline_config(DeltaStrategy::PrimaryKey, false);
    config.delta.on_key_match = KeyMatchPolicy::Skip;

    let destination = MemoryDestination::with_records(id_vals(&[(1, "old")]));
    let pipeline = Pipeline::new(
        config,
        MemorySource::new(id_vals(&[(1, "new"), (2, "b")])),
        destination.clone(),
        MemoryRunLocks::new(),
    );

    let result = pipeline.run().await.unwrap();

    assert_eq!((result.inserted, result.updated), (1, 0));
    assert_eq!(result.unchanged, 1);
    assert_eq!(
        sorted_by_id(destination.records().await),
        id_vals(&[(1, "old"), (2, "b")])
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn deletes_only_happen_when_enabled() {
    init_test_tracing();

    for (delete_enabled, expected) in [
        (false, id_vals(&[(1, "a"), (2, "b")])),
        (true, id_vals(&[(1, "a")])),
    ] {
        let destination = MemoryDestination::with_records(id_vals(&[(1, "a"), (2, "b")]));
        let pipeline = Pipeline::new(
            memory_pipeline_config(DeltaStrategy::FullRow, delete_enabled),
            MemorySource::new(id_vals(&[(1, "a")])),
            destination.clone(),
            MemoryRunLocks::new(),
        );

        let result = pipeline.run().await.unwrap();

        assert_eq!(result.deleted, usize::from(delete_enabled));
        assert_eq!(result.retained, usize::from(!delete_enabled));
        assert_eq!(sorted_by_id(destination.records().await), expected);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_source_keys_abort_before_any_write() {
    init_test_tracing();

    let destination = MemoryDestination::new();
    let pipeline = Pipeline::new(
        memory_pipeline_config(DeltaStrategy::FullRow, false),
        MemorySource::new(id_vals(&[(1, "a"), (1, "b"), (2, "c")])),
        destination.clone(),
        MemoryRunLocks::new(),
    );

    let err = pipeline.run().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DataIntegrityError);
    assert!(destination.batches().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn destination_rows_without_key_abort_the_run() {
    init_test_tracing();

    let mut existing = id_vals(&[(1, "a")]);
    existing.push(Record::from_pairs([
        ("id", Cell::Null),
        ("val", Cell::from("orphan")),
    ]));

    let destination = MemoryDestination::with_records(existing);
    let pipeline = Pipeline::new(
        memory_pipeline_config(DeltaStrategy::FullRow, true),
        MemorySource::new(id_vals(&[(2, "b")])),
        destination.clone(),
        MemoryRunLocks::new(),
    );

    let err = pipeline.run().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DataIntegrityError);
    assert!(destination.batches().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn fetch_failures_abort_the_run() {
    init_test_tracing();

    let destination = MemoryDestination::new();
    let pipeline = Pipeline::new(
        memory_pipeline_config(DeltaStrategy::FullRow, false),
        MemorySource::failing(ErrorKind::SourceUnavailable),
        destination.clone(),
        MemoryRunLocks::new(),
    );

    let err = pipeline.run().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SourceUnavailable);

    let destination = MemoryDestination::new();
    destination.fail_reads(ErrorKind::DestinationUnavailable).await;
    let pipeline = Pipeline::new(
        memory_pipeline_config(DeltaStrategy::FullRow, false),
        MemorySource::new(id_vals(&[(1, "a")])),
        destination.clone(),
        MemoryRunLocks::new(),
    );

    let err = pipeline.run().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DestinationUnavailable);
    assert!(destination.batches().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_configuration_fails_before_any_io() {
    init_test_tracing();

    let mut config = memory_pipeline_config(DeltaStrategy::FullRow, false);
    config.delta.primary_key.clear();

    let destination = TestDestinationWrapper::wrap(MemoryDestination::new());
    let pipeline = Pipeline::new(
        config,
        MemorySource::new(id_vals(&[(1, "a")])),
        destination.clone(),
        MemoryRunLocks::new(),
    );

    let err = pipeline.run().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConfigError);
    assert_eq!(destination.read_calls(), 0);
    assert_eq!(destination.write_calls(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_run_on_the_same_destination_fails_fast() {
    init_test_tracing();

    let locks = MemoryRunLocks::new();
    let destination = MemoryDestination::new();
    let pipeline = Pipeline::new(
        memory_pipeline_config(DeltaStrategy::FullRow, false),
        MemorySource::new(id_vals(&[(1, "a")])),
        destination.clone(),
        locks.clone(),
    );

    let held = locks.try_acquire(&destination.identity()).unwrap();
    let err = pipeline.run().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RunInProgress);
    assert!(destination.batches().await.is_empty());

    drop(held);
    assert!(pipeline.run().await.unwrap().is_success());
    assert!(!locks.is_held(&destination.identity()));
}

#[tokio::test(flavor = "multi_thread")]
async fn declared_schema_mismatch_aborts_the_run() {
    init_test_tracing();

    let mut config = memory_pipeline_config(DeltaStrategy::FullRow, false);
    config.schema = Some(vec![
        ColumnSchema::new("id", ColumnType::Integer),
        ColumnSchema::new("val", ColumnType::Integer),
    ]);

    let destination = MemoryDestination::new();
    let pipeline = Pipeline::new(
        config,
        MemorySource::new(id_vals(&[(1, "not a number")])),
        destination.clone(),
        MemoryRunLocks::new(),
    );

    let err = pipeline.run().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SchemaMismatchError);
    assert!(destination.batches().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn row_failures_are_reported_and_the_rerun_completes() {
    init_test_tracing();

    let mut config = memory_pipeline_config(DeltaStrategy::FullRow, false);
    config.apply.retry.max_attempts = 2;

    let destination = MemoryDestination::new();
    destination
        .fail_row(id_key(2), ErrorKind::DestinationUnavailable, Some(2))
        .await;
    let pipeline = Pipeline::new(
        config,
        MemorySource::new(id_vals(&[(1, "a"), (2, "b"), (3, "c")])),
        destination.clone(),
        MemoryRunLocks::new(),
    );

    let result = pipeline.run().await.unwrap();

    assert_eq!(result.inserted, 2);
    assert_eq!(result.failed_retryable, vec![id_key(2)]);
    assert!(result.needs_rerun());

    let rerun = pipeline.run().await.unwrap();

    assert!(rerun.is_success());
    assert_eq!(rerun.inserted, 1);
    assert_eq!(rerun.unchanged, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn run_timeout_leaves_undispatched_batches_unapplied() {
    init_test_tracing();

    let mut config = memory_pipeline_config(DeltaStrategy::FullRow, false);
    config.apply.batch.max_size = 1;
    config.apply.max_concurrent_batches = 1;
    config.apply.run_timeout_ms = Some(1);

    let destination = TestDestinationWrapper::wrap(MemoryDestination::new())
        .with_write_delay(Duration::from_millis(50));
    let pipeline = Pipeline::new(
        config,
        MemorySource::new(id_vals(&[(1, "a"), (2, "b"), (3, "c"), (4, "d"), (5, "e")])),
        destination.clone(),
        MemoryRunLocks::new(),
    );

    let result = pipeline.run().await.unwrap();

    assert!(result.timed_out);
    assert!(result.needs_rerun());
    assert!(result.unapplied.len() >= 4);
    assert_eq!(result.inserted + result.unapplied.len(), 5);
    assert_eq!(
        destination.inner().records().await.len(),
        result.inserted
    );
}
