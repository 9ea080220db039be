use crate::error::{ErrorKind, EtlError};

/// Retry behavior for a classified error.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RetryDirective {
    /// Transient failure, retried automatically with backoff.
    Timed,
    /// Needs an operator to fix something before a re-run can succeed.
    Manual,
    /// Retrying cannot help.
    NoRetry,
}

impl RetryDirective {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetryDirective::Timed => "timed",
            RetryDirective::Manual => "manual",
            RetryDirective::NoRetry => "no_retry",
        }
    }
}

/// How the merge executor and the command line runner treat an [`EtlError`].
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ErrorHandlingPolicy {
    retry_directive: RetryDirective,
    solution: Option<&'static str>,
}

impl ErrorHandlingPolicy {
    const fn new(retry_directive: RetryDirective, solution: Option<&'static str>) -> Self {
        Self {
            retry_directive,
            solution,
        }
    }

    pub fn retry_directive(&self) -> RetryDirective {
        self.retry_directive
    }

    /// Operator-facing hint, if there is one.
    pub fn solution(&self) -> Option<&'static str> {
        self.solution
    }

    /// Whether the failed rows are retried within the run.
    pub fn is_retryable(&self) -> bool {
        self.retry_directive == RetryDirective::Timed
    }
}

/// Classifies an error. Only [`RetryDirective::Timed`] errors are retried by the merge executor,
/// every other directive makes the row fail fatally.
pub fn build_error_handling_policy(error: &EtlError) -> ErrorHandlingPolicy {
    match error.kind() {
        // Keep this list narrow: only failures expected to clear up on their own.
        ErrorKind::SourceUnavailable | ErrorKind::DestinationUnavailable => {
            ErrorHandlingPolicy::new(RetryDirective::Timed, None)
        }

        ErrorKind::ConfigError => ErrorHandlingPolicy::new(
            RetryDirective::Manual,
            Some("Fix the pipeline configuration file and run again."),
        ),
        ErrorKind::DataIntegrityError => ErrorHandlingPolicy::new(
            RetryDirective::Manual,
            Some("Remove duplicate keys or fill in missing key values at the reported side."),
        ),
        ErrorKind::SchemaMismatchError | ErrorKind::SourceSchemaError => ErrorHandlingPolicy::new(
            RetryDirective::Manual,
            Some("Align the source columns with the declared schema and key columns."),
        ),
        ErrorKind::DestinationSchemaError => ErrorHandlingPolicy::new(
            RetryDirective::Manual,
            Some("Check that the destination accepts the source columns."),
        ),
        ErrorKind::ConstraintViolation | ErrorKind::InvalidData => ErrorHandlingPolicy::new(
            RetryDirective::Manual,
            Some("Correct the rejected rows at the source, then run again."),
        ),
        ErrorKind::RunInProgress => ErrorHandlingPolicy::new(
            RetryDirective::Manual,
            Some("Wait for the running pipeline to finish, or remove a stale lock file."),
        ),

        #[cfg(feature = "failpoints")]
        ErrorKind::WithNoRetry => {
            ErrorHandlingPolicy::new(RetryDirective::NoRetry, Some("Cannot retry this error."))
        }
        #[cfg(feature = "failpoints")]
        ErrorKind::WithManualRetry => ErrorHandlingPolicy::new(
            RetryDirective::Manual,
            Some("Manually trigger retry after resolving the issue."),
        ),
        #[cfg(feature = "failpoints")]
        ErrorKind::WithTimedRetry => ErrorHandlingPolicy::new(RetryDirective::Timed, None),

        ErrorKind::MergeWorkerPanic => ErrorHandlingPolicy::new(RetryDirective::NoRetry, None),

        _ => ErrorHandlingPolicy::new(
            RetryDirective::Manual,
            Some("Inspect the error detail. Re-running is safe once the cause is resolved."),
        ),
    }
}
