//! Layered configuration loading: TOML file, then `ERX__*` environment.

use std::path::PathBuf;

use config::{Config, Environment, File};
use tracing::debug;

use crate::error::ConfigError;
use crate::settings::AppConfig;

/// File read when no path is given.
pub const DEFAULT_CONFIG_PATH: &str = "erx.toml";

/// Prefix of environment overrides, e.g. `ERX__BLOB_CACHE__REFRESH_INTERVAL_SECS=30`.
pub const ENV_PREFIX: &str = "ERX";

/// The environment source used by [`load_config`].
pub fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .try_parsing(true)
        .separator("__")
}

/// Loads and validates the configuration.
///
/// An explicit `path` must exist. Without one, `erx.toml` in the working
/// directory is used if present.
///
/// # Errors
///
/// Returns an error if a source cannot be read, the result does not
/// deserialize, or validation fails.
pub fn load_config(path: Option<&str>) -> Result<AppConfig, ConfigError> {
    load_config_with_env(path, environment())
}

/// Like [`load_config`] with a caller supplied environment source.
///
/// # Errors
///
/// See [`load_config`].
pub fn load_config_with_env(path: Option<&str>, env: Environment) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();
    match path {
        Some(p) => {
            let pathbuf = PathBuf::from(p);
            if !pathbuf.exists() {
                return Err(ConfigError::load(format!("config file {p} does not exist")));
            }
            debug!(path = p, "loading configuration file");
            builder = builder.add_source(File::from(pathbuf));
        }
        None => {
            let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                debug!(path = DEFAULT_CONFIG_PATH, "loading configuration file");
                builder = builder.add_source(File::from(default_path));
            }
        }
    }
    builder = builder.add_source(env);

    let cfg = builder
        .build()
        .map_err(|e| ConfigError::load(e.to_string()))?;
    let merged: AppConfig = cfg.try_deserialize().map_err(ConfigError::Deserialize)?;
    merged.validate()?;
    Ok(merged)
}
