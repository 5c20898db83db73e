use std::{
    env, io,
    path::{Path, PathBuf},
};

use rust_cli_config::{File, FileFormat};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::environment::Environment;

/// Directory containing configuration files, relative to the working directory.
const DEFAULT_CONFIGURATION_DIR: &str = "configuration";

/// Environment variable that overrides [`DEFAULT_CONFIGURATION_DIR`].
const CONFIGURATION_DIR_ENV_NAME: &str = "BR_CONFIGURATION_DIR";

/// Extensions probed, in order, for every configuration file stem.
const CONFIG_FILE_EXTENSIONS: &[(&str, FileFormat)] = &[
    ("yaml", FileFormat::Yaml),
    ("yml", FileFormat::Yaml),
    ("json", FileFormat::Json),
];

/// Prefix for environment variable overrides, e.g. `BR_TENANT_ID`.
const ENV_PREFIX: &str = "BR";

/// Separator for nested keys in environment variable overrides, e.g. `BR_DRAIN__MAX_WAIT_MS`.
const ENV_SEPARATOR: &str = "__";

/// Implemented by top-level configuration structures loadable through [`load_config`].
pub trait Config {
    /// Keys whose environment overrides are comma-separated lists.
    const LIST_PARSE_KEYS: &'static [&'static str];
}

/// Errors that can occur while loading configuration files and overrides.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[source] io::Error),

    #[error("configuration directory `{0}` does not exist")]
    MissingConfigurationDirectory(PathBuf),

    #[error("no base configuration found in `{directory}`; attempted: {attempted}")]
    BaseConfigurationMissing { directory: PathBuf, attempted: String },

    #[error("failed to determine runtime environment: {0}")]
    Environment(#[source] io::Error),

    #[error("failed to build configuration: {0}")]
    Build(#[source] rust_cli_config::ConfigError),

    #[error("failed to deserialize configuration: {0}")]
    Deserialization(#[source] rust_cli_config::ConfigError),
}

/// Loads configuration from `base.*`, an optional `{environment}.*` file and `BR_` overrides.
///
/// The base file is mandatory. The environment file (`dev`, `staging`, `prod`) is merged on
/// top when present, and environment variables win over both.
pub fn load_config<T>() -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    let directory = configuration_directory()?;
    let environment = Environment::load().map_err(LoadConfigError::Environment)?;

    load_config_from(&directory, environment)
}

/// Same as [`load_config`] with an explicit directory and environment.
pub fn load_config_from<T>(directory: &Path, environment: Environment) -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    if !directory.is_dir() {
        return Err(LoadConfigError::MissingConfigurationDirectory(
            directory.to_path_buf(),
        ));
    }

    let Some(base) = find_configuration_file(directory, "base") else {
        return Err(LoadConfigError::BaseConfigurationMissing {
            directory: directory.to_path_buf(),
            attempted: attempted_paths(directory, "base"),
        });
    };

    let mut builder = rust_cli_config::Config::builder().add_source(base);
    if let Some(overrides) = find_configuration_file(directory, environment.as_str()) {
        builder = builder.add_source(overrides);
    }

    let mut environment_source = rust_cli_config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator(ENV_SEPARATOR);
    if !T::LIST_PARSE_KEYS.is_empty() {
        environment_source = environment_source.try_parsing(true).list_separator(",");
        for key in T::LIST_PARSE_KEYS {
            environment_source = environment_source.with_list_parse_key(key);
        }
    }

    builder
        .add_source(environment_source)
        .build()
        .map_err(LoadConfigError::Build)?
        .try_deserialize::<T>()
        .map_err(LoadConfigError::Deserialization)
}

fn configuration_directory() -> Result<PathBuf, LoadConfigError> {
    if let Ok(directory) = env::var(CONFIGURATION_DIR_ENV_NAME) {
        return Ok(PathBuf::from(directory));
    }

    let current = env::current_dir().map_err(LoadConfigError::CurrentDir)?;
    Ok(current.join(DEFAULT_CONFIGURATION_DIR))
}

fn find_configuration_file(
    directory: &Path,
    stem: &str,
) -> Option<File<rust_cli_config::FileSourceFile, FileFormat>> {
    CONFIG_FILE_EXTENSIONS.iter().find_map(|(extension, format)| {
        let path = directory.join(format!("{stem}.{extension}"));
        path.is_file()
            .then(|| File::from(path).format(*format).required(true))
    })
}

fn attempted_paths(directory: &Path, stem: &str) -> String {
    CONFIG_FILE_EXTENSIONS
        .iter()
        .map(|(extension, _)| format!("`{}`", directory.join(format!("{stem}.{extension}")).display()))
        .collect::<Vec<_>>()
        .join(", ")
}
