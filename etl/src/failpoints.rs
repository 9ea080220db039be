use fail::fail_point;

use crate::bail;
use crate::error::{ErrorKind, EtlResult};

/// Fails a batch write before it reaches the destination.
pub const MERGE_BATCH__BEFORE_WRITE: &str = "merge_batch.before_write";

/// Fails the run after the delta is computed and before anything is applied.
pub const PIPELINE_RUN__AFTER_DELTA: &str = "pipeline_run.after_delta";

/// Evaluates the named fail point.
///
/// The configured parameter picks the error kind: `timed_retry` fails with a retryable kind,
/// `manual_retry` and `no_retry` with fatal ones. Anything else defaults to `no_retry`.
pub fn etl_fail_point(name: &str) -> EtlResult<()> {
    fail_point!(name, |parameter| {
        let error_kind = match parameter.as_deref() {
            Some("timed_retry") => ErrorKind::WithTimedRetry,
            Some("manual_retry") => ErrorKind::WithManualRetry,
            _ => ErrorKind::WithNoRetry,
        };

        bail!(
            error_kind,
            "An error occurred in a fail point",
            format!("The failpoint '{name}' returned an error")
        );
    });

    Ok(())
}
