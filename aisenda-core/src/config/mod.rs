//! Configuration module for the assistant client
//!
//! Configuration comes from a YAML or JSON file (with `${VAR}` interpolation)
//! or from `AISENDA_*` environment variables, and is validated before use.

mod env;
mod error;
mod schema;
mod secrets;
mod validator;

pub use env::{
    from_env, interpolate_env_vars, ENV_API_KEY, ENV_BASE_URL, ENV_HISTORY_PATH, ENV_IMAGE_MODEL,
    ENV_MODEL,
};
pub use error::{ConfigError, ConfigResult, ValidationError, ValidationErrorKind};
pub use schema::{
    ClientConfig, HistoryConfig, StreamSettings, DEFAULT_BASE_URL, DEFAULT_IMAGE_MODEL,
    DEFAULT_MODEL,
};
pub use secrets::SecretString;
pub use validator::ConfigValidator;

use std::fs;
use std::path::Path;
use tracing::debug;

/// Load a configuration from a YAML file
pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> ConfigResult<ClientConfig> {
    let path = path.as_ref();
    let content = read(path)?;
    let interpolated = env::interpolate_env_vars(&content)?;

    let config: ClientConfig =
        serde_yaml::from_str(&interpolated).map_err(|e| ConfigError::ParseError {
            path: path.to_string_lossy().to_string(),
            line: e.location().map(|l| l.line()),
            column: e.location().map(|l| l.column()),
            message: e.to_string(),
        })?;

    ConfigValidator::new().validate(&config)?;
    debug!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Load a configuration from a JSON file
pub fn load_from_json<P: AsRef<Path>>(path: P) -> ConfigResult<ClientConfig> {
    let path = path.as_ref();
    let content = read(path)?;
    let interpolated = env::interpolate_env_vars(&content)?;

    let config: ClientConfig =
        serde_json::from_str(&interpolated).map_err(|e| ConfigError::ParseError {
            path: path.to_string_lossy().to_string(),
            line: Some(e.line()),
            column: Some(e.column()),
            message: e.to_string(),
        })?;

    ConfigValidator::new().validate(&config)?;
    debug!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Load a configuration file, picking the format from its extension
pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<ClientConfig> {
    let path = path.as_ref();
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => load_from_json(path),
        _ => load_from_yaml(path),
    }
}

/// Load and validate a configuration from the environment
pub fn load_from_env() -> ConfigResult<ClientConfig> {
    let config = env::from_env()?;
    ConfigValidator::new().validate(&config)?;
    Ok(config)
}

fn read(path: &Path) -> ConfigResult<String> {
    fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.to_string_lossy().to_string(),
        source: e,
    })
}
