use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt;

use etl::error::{ErrorKind, EtlError};
use etl::merge::policy::build_error_handling_policy;

/// Process exit codes of the `run` command.
pub mod exit_code {
    pub const SUCCESS: u8 = 0;
    pub const CONFIGURATION: u8 = 1;
    pub const SOURCE: u8 = 2;
    pub const DESTINATION: u8 = 3;
    pub const RUN_IN_PROGRESS: u8 = 4;
}

/// Returns whether terminal output should include backtraces.
fn should_render_backtrace() -> bool {
    matches!(
        std::env::var("RUST_BACKTRACE").as_deref(),
        Ok("1") | Ok("full")
    )
}

/// Result type for replicator operations.
pub type ReplicatorResult<T> = Result<T, ReplicatorError>;

/// Captured backtrace wrapper to avoid thiserror's unstable feature detection.
pub struct CapturedBacktrace(Backtrace);

impl CapturedBacktrace {
    fn capture() -> Self {
        Self(Backtrace::capture())
    }
}

impl fmt::Debug for CapturedBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type for the replicator binary.
///
/// Wraps [`EtlError`] for run failures and adds variants for failures outside of a run.
#[derive(Debug)]
pub enum ReplicatorError {
    /// Pipeline run error.
    Etl(EtlError),
    /// Configuration loading or validation error.
    Config(Box<dyn Error + Send + Sync>, CapturedBacktrace),
    /// I/O error outside of a run.
    Io(std::io::Error, CapturedBacktrace),
}

impl ReplicatorError {
    /// Returns a short category label for this error.
    pub fn category(&self) -> &'static str {
        match self {
            ReplicatorError::Etl(err) => match exit_code_for_kind(err.kind()) {
                exit_code::CONFIGURATION => "configuration error",
                exit_code::SOURCE => "source error",
                exit_code::RUN_IN_PROGRESS => "run in progress",
                _ => "destination error",
            },
            ReplicatorError::Config(_, _) => "configuration error",
            ReplicatorError::Io(_, _) => "i/o error",
        }
    }

    /// Returns the process exit code reporting this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            ReplicatorError::Etl(err) => exit_code_for_kind(err.kind()),
            ReplicatorError::Config(_, _) => exit_code::CONFIGURATION,
            ReplicatorError::Io(_, _) => exit_code::DESTINATION,
        }
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self {
            ReplicatorError::Etl(err) => err.backtrace(),
            ReplicatorError::Config(_, cb) => Some(&cb.0),
            ReplicatorError::Io(_, cb) => Some(&cb.0),
        }
    }

    /// Creates a configuration error from any error.
    pub fn config<E: Error + Send + Sync + 'static>(err: E) -> Self {
        ReplicatorError::Config(Box::new(err), CapturedBacktrace::capture())
    }

    /// Returns the distinct operator hints of the underlying pipeline errors.
    pub fn solutions(&self) -> Vec<&'static str> {
        let ReplicatorError::Etl(err) = self else {
            return Vec::new();
        };

        let mut solutions = Vec::new();
        for err in err.errors() {
            if let Some(solution) = build_error_handling_policy(err).solution()
                && !solutions.contains(&solution)
            {
                solutions.push(solution);
            }
        }
        solutions
    }

    /// Returns a user-oriented report for terminal output.
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        out.push_str("replicator failed\n");
        out.push_str(&format!("category: {}\n", self.category()));
        out.push_str(&format!("error: {self}\n"));

        let aggregated = matches!(self, ReplicatorError::Etl(err) if err.errors().len() > 1);
        if aggregated {
            if let ReplicatorError::Etl(err) = self {
                for (idx, err) in err.errors().iter().enumerate() {
                    out.push_str(&format!("error {}: {}\n", idx + 1, err.summary()));
                }
            }
        } else {
            let mut source = Error::source(self);
            let mut idx = 1usize;
            while let Some(err) = source {
                out.push_str(&format!("cause {idx}: {err}\n"));
                source = err.source();
                idx += 1;
            }
        }

        for solution in self.solutions() {
            out.push_str(&format!("solution: {solution}\n"));
        }

        if should_render_backtrace()
            && let Some(backtrace) = self.backtrace()
        {
            out.push_str("backtrace:\n");
            out.push_str(&backtrace.to_string());
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }

        out
    }
}

/// Maps an error kind to the exit code reporting it.
pub fn exit_code_for_kind(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::ConfigError
        | ErrorKind::DataIntegrityError
        | ErrorKind::SchemaMismatchError => exit_code::CONFIGURATION,
        ErrorKind::SourceUnavailable | ErrorKind::SourceSchemaError => exit_code::SOURCE,
        ErrorKind::RunInProgress => exit_code::RUN_IN_PROGRESS,
        _ => exit_code::DESTINATION,
    }
}

impl fmt::Display for ReplicatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplicatorError::Etl(err) => write!(f, "{}", err.summary()),
            ReplicatorError::Config(source, _) => write!(f, "configuration error: {source}"),
            ReplicatorError::Io(source, _) => write!(f, "i/o error: {source}"),
        }
    }
}

impl Error for ReplicatorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ReplicatorError::Etl(err) => err.source(),
            ReplicatorError::Config(source, _) => Some(source.as_ref()),
            ReplicatorError::Io(source, _) => Some(source),
        }
    }
}

impl From<std::io::Error> for ReplicatorError {
    fn from(err: std::io::Error) -> Self {
        ReplicatorError::Io(err, CapturedBacktrace::capture())
    }
}

impl From<EtlError> for ReplicatorError {
    fn from(err: EtlError) -> Self {
        ReplicatorError::Etl(err)
    }
}
