//! Command line entry point running one delta reconciliation.
//!
//! `replicator run <config>` loads and validates the configuration, runs the pipeline once and
//! prints a JSON summary of the run on stdout. The exit code tells the caller what to do next:
//! re-running the same command is always safe.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use config::load_pipeline_config;
use etl::merge::RunResult;
use telemetry::tracing::init_tracing;
use tracing::{error, info, warn};

use crate::core::{default_lock_dir, run_pipeline};
use crate::error::{ReplicatorError, ReplicatorResult, exit_code};

mod core;
mod error;

#[derive(Debug, Parser)]
#[command(name = "replicator", version, about = "Reconciles a destination with a source")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Runs the pipeline described by a configuration file once.
    Run {
        /// Path to the JSON configuration file.
        config: PathBuf,
        /// Directory holding run lock files.
        #[arg(long)]
        lock_dir: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _log_flusher = match init_tracing(env!("CARGO_BIN_NAME")) {
        Ok(flusher) => Some(flusher),
        Err(err) => {
            eprintln!("failed to initialize tracing: {err}");
            None
        }
    };

    match cli.command {
        Command::Run { config, lock_dir } => {
            let lock_dir = lock_dir.unwrap_or_else(default_lock_dir);

            match run(&config, lock_dir) {
                Ok(result) => report_result(&result),
                Err(err) => {
                    error!(error = %err, exit_code = err.exit_code(), "replicator run failed");
                    eprint!("{}", err.render_report());
                    ExitCode::from(err.exit_code())
                }
            }
        }
    }
}

fn run(config_path: &Path, lock_dir: PathBuf) -> ReplicatorResult<RunResult> {
    let config = load_pipeline_config(config_path).map_err(ReplicatorError::config)?;

    // We start the runtime.
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run_pipeline(config, lock_dir))
}

/// Prints the run summary and returns the matching exit code.
fn report_result(result: &RunResult) -> ExitCode {
    match serde_json::to_string_pretty(result) {
        Ok(summary) => println!("{summary}"),
        Err(err) => warn!(error = %err, "failed to render the run summary"),
    }

    let code = result_exit_code(result);
    if code == exit_code::SUCCESS {
        info!(run_id = %result.run_id, "replicator run succeeded");
    } else {
        warn!(
            run_id = %result.run_id,
            failed = result.failed(),
            unapplied = result.unapplied.len(),
            timed_out = result.timed_out,
            "replicator run finished with unapplied rows, re-run the same command"
        );
    }

    ExitCode::from(code)
}

/// A run that completed but left rows failed or unapplied is a destination failure.
fn result_exit_code(result: &RunResult) -> u8 {
    if result.is_success() {
        exit_code::SUCCESS
    } else {
        exit_code::DESTINATION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_command() {
        let cli = Cli::try_parse_from(["replicator", "run", "pipeline.json", "--lock-dir", "/tmp/l"])
            .unwrap();

        let Command::Run { config, lock_dir } = cli.command;
        assert_eq!(config, PathBuf::from("pipeline.json"));
        assert_eq!(lock_dir, Some(PathBuf::from("/tmp/l")));
    }

    #[test]
    fn run_requires_a_config_path() {
        assert!(Cli::try_parse_from(["replicator", "run"]).is_err());
    }

    #[test]
    fn missing_config_file_is_a_configuration_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(&dir.path().join("nope.json"), dir.path().join("locks")).unwrap_err();

        assert_eq!(err.exit_code(), exit_code::CONFIGURATION);
    }
}
