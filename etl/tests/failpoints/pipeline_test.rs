use config::shared::DeltaStrategy;
use etl::destination::memory::MemoryDestination;
use etl::error::ErrorKind;
use etl::failpoints::{MERGE_BATCH__BEFORE_WRITE, PIPELINE_RUN__AFTER_DELTA};
use etl::lock::MemoryRunLocks;
use etl::pipeline::Pipeline;
use etl::source::memory::MemorySource;
use etl::test_utils::failpoints::CustomFailScenario;
use etl::test_utils::records::{id_vals, memory_pipeline_config, sorted_by_id};
use telemetry::tracing::init_test_tracing;

#[tokio::test(flavor = "multi_thread")]
async fn failure_after_delta_writes_nothing() {
    init_test_tracing();
    let _scenario = CustomFailScenario::setup(&[(PIPELINE_RUN__AFTER_DELTA, "return")]);

    let destination = MemoryDestination::new();
    let pipeline = Pipeline::new(
        memory_pipeline_config(DeltaStrategy::FullRow, false),
        MemorySource::new(id_vals(&[(1, "a")])),
        destination.clone(),
        MemoryRunLocks::new(),
    );

    let err = pipeline.run().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::WithNoRetry);
    assert!(destination.batches().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn transient_batch_failures_are_retried() {
    init_test_tracing();
    // The first two write attempts fail with a retryable error, then the fail point turns off.
    let _scenario =
        CustomFailScenario::setup(&[(MERGE_BATCH__BEFORE_WRITE, "2*return(timed_retry)")]);

    let destination = MemoryDestination::new();
    let pipeline = Pipeline::new(
        memory_pipeline_config(DeltaStrategy::FullRow, false),
        MemorySource::new(id_vals(&[(1, "a"), (2, "b")])),
        destination.clone(),
        MemoryRunLocks::new(),
    );

    let result = pipeline.run().await.unwrap();

    assert!(result.is_success());
    assert_eq!(result.inserted, 2);
    assert_eq!(
        sorted_by_id(destination.records().await),
        id_vals(&[(1, "a"), (2, "b")])
    );
    // Failed attempts never reach the destination.
    assert_eq!(destination.batches().await.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn fatal_batch_failures_are_reported_per_row() {
    init_test_tracing();
    let _scenario = CustomFailScenario::setup(&[(MERGE_BATCH__BEFORE_WRITE, "return(manual_retry)")]);

    let destination = MemoryDestination::new();
    let pipeline = Pipeline::new(
        memory_pipeline_config(DeltaStrategy::FullRow, false),
        MemorySource::new(id_vals(&[(1, "a"), (2, "b")])),
        destination.clone(),
        MemoryRunLocks::new(),
    );

    let result = pipeline.run().await.unwrap();

    assert_eq!(result.inserted, 0);
    assert_eq!(result.failed_fatal.len(), 2);
    assert!(
        result
            .failed_fatal
            .iter()
            .all(|row| row.error.kind() == ErrorKind::WithManualRetry)
    );
    assert!(!result.needs_rerun());
    assert!(destination.records().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn retryable_batch_failures_exhaust_into_the_result() {
    init_test_tracing();
    let _scenario = CustomFailScenario::setup(&[(MERGE_BATCH__BEFORE_WRITE, "return(timed_retry)")]);

    let mut config = memory_pipeline_config(DeltaStrategy::FullRow, false);
    config.apply.retry.max_attempts = 3;

    let destination = MemoryDestination::new();
    let pipeline = Pipeline::new(
        config,
        MemorySource::new(id_vals(&[(1, "a")])),
        destination.clone(),
        MemoryRunLocks::new(),
    );

    let result = pipeline.run().await.unwrap();

    assert_eq!(result.failed_retryable.len(), 1);
    assert!(result.needs_rerun());
    assert!(destination.batches().await.is_empty());
}
