use std::path::{Path, PathBuf};

use rust_cli_config::{Config, Environment, File, FileFormat};
use thiserror::Error;

use crate::shared::{PipelineConfig, ValidationError};

/// Prefix for environment variable configuration overrides.
const ENV_PREFIX: &str = "APP";

/// Separator between environment variable prefix and key segments.
const ENV_PREFIX_SEPARATOR: &str = "_";

/// Separator for nested configuration keys in environment variables.
const ENV_SEPARATOR: &str = "__";

/// Separator for list elements in environment variables.
const LIST_SEPARATOR: &str = ",";

/// Keys whose environment overrides are parsed as comma separated lists.
const LIST_PARSE_KEYS: &[&str] = &["delta.primary_key"];

/// Errors that can occur while loading a pipeline configuration.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    /// The configuration file does not exist.
    #[error("configuration file `{0}` does not exist")]
    MissingConfigurationFile(PathBuf),

    /// The configuration file exists but could not be parsed.
    #[error("failed to load configuration from `{path}`: {source}")]
    ConfigurationFileLoad {
        path: PathBuf,
        source: rust_cli_config::ConfigError,
    },

    /// The configuration was parsed but does not match the expected shape.
    #[error("failed to deserialize configuration: {0}")]
    Deserialization(#[source] rust_cli_config::ConfigError),

    /// The configuration has the expected shape but holds invalid values.
    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationError),
}

/// Loads and validates a pipeline configuration from a JSON file.
///
/// Values from the file can be overridden by `APP_`-prefixed environment variables. Nested keys
/// use double underscores (`APP_DELTA__DELETE_ENABLED=true`) and key columns are comma separated
/// (`APP_DELTA__PRIMARY_KEY=id,region`).
pub fn load_pipeline_config(path: &Path) -> Result<PipelineConfig, LoadConfigError> {
    if !path.is_file() {
        return Err(LoadConfigError::MissingConfigurationFile(
            path.to_path_buf(),
        ));
    }

    let mut environment_source = Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
        .list_separator(LIST_SEPARATOR);

    for key in LIST_PARSE_KEYS {
        environment_source = environment_source.with_list_parse_key(key);
    }

    let settings = Config::builder()
        .add_source(File::from(path).format(FileFormat::Json))
        .add_source(environment_source)
        .build()
        .map_err(|source| LoadConfigError::ConfigurationFileLoad {
            path: path.to_path_buf(),
            source,
        })?;

    let config = settings
        .try_deserialize::<PipelineConfig>()
        .map_err(LoadConfigError::Deserialization)?;

    config.validate()?;

    Ok(config)
}
