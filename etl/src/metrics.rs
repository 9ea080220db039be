//! Metric names recorded while reconciling and applying deltas.
//!
//! Values go through the `metrics` facade. The core never installs a recorder, so nothing is
//! exported unless the embedding binary does.

use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};

static REGISTER_METRICS: Once = Once::new();

/// Label for the destination kind, as returned by `Destination::name` (`local_file`, `memory`).
pub const DESTINATION_LABEL: &str = "destination";

/// Label for the write operation of a batch (`insert`, `update`, `delete`).
pub const OPERATION_LABEL: &str = "operation";

/// Label for the classified outcome of a row failure (`retryable`, `fatal`).
pub const OUTCOME_LABEL: &str = "outcome";

/// Label for the delta strategy in use.
pub const STRATEGY_LABEL: &str = "strategy";

/// Counter of rows classified by the delta engine.
/// Labels: `destination`, `strategy`, `operation` (`insert`, `update`, `delete`, `unchanged`).
pub const ETL_DELTA_ROWS_TOTAL: &str = "etl_delta_rows_total";

/// Counter of rows successfully written. Labels: `destination`, `operation`.
pub const ETL_ROWS_APPLIED_TOTAL: &str = "etl_rows_applied_total";

/// Counter of rows that ended the run failed. Labels: `destination`, `outcome`.
pub const ETL_ROWS_FAILED_TOTAL: &str = "etl_rows_failed_total";

/// Counter of batch attempts that were retried. Labels: `destination`, `operation`.
pub const ETL_BATCH_RETRIES_TOTAL: &str = "etl_batch_retries_total";

/// Duration of a single batch write attempt. Labels: `destination`, `operation`.
pub const ETL_BATCH_WRITE_DURATION_SECONDS: &str = "etl_batch_write_duration_seconds";

/// Duration of a whole run from lock acquisition to summary. Labels: `destination`.
pub const ETL_RUN_DURATION_SECONDS: &str = "etl_run_duration_seconds";

/// Describes the metrics above. Registration happens once per process.
pub fn register_metrics() {
    REGISTER_METRICS.call_once(|| {
        describe_counter!(
            ETL_DELTA_ROWS_TOTAL,
            Unit::Count,
            "Rows classified by the delta engine, labeled by destination, strategy and operation"
        );

        describe_counter!(
            ETL_ROWS_APPLIED_TOTAL,
            Unit::Count,
            "Rows written to the destination, labeled by destination and operation"
        );

        describe_counter!(
            ETL_ROWS_FAILED_TOTAL,
            Unit::Count,
            "Rows that could not be applied, labeled by destination and outcome"
        );

        describe_counter!(
            ETL_BATCH_RETRIES_TOTAL,
            Unit::Count,
            "Batch write attempts retried after a retryable failure"
        );

        describe_histogram!(
            ETL_BATCH_WRITE_DURATION_SECONDS,
            Unit::Seconds,
            "Duration of a single batch write attempt, labeled by destination and operation"
        );

        describe_histogram!(
            ETL_RUN_DURATION_SECONDS,
            Unit::Seconds,
            "Duration of a pipeline run, labeled by destination"
        );
    });
}
