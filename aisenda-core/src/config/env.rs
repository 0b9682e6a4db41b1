//! Environment variable interpolation and environment-only configuration

use super::error::ConfigError;
use super::schema::ClientConfig;
use super::secrets::SecretString;
use regex::{Captures, Regex};
use std::env;

pub const ENV_BASE_URL: &str = "AISENDA_BASE_URL";
pub const ENV_API_KEY: &str = "AISENDA_API_KEY";
pub const ENV_MODEL: &str = "AISENDA_MODEL";
pub const ENV_IMAGE_MODEL: &str = "AISENDA_IMAGE_MODEL";
pub const ENV_HISTORY_PATH: &str = "AISENDA_HISTORY_PATH";

fn env_var_pattern() -> Result<Regex, ConfigError> {
    Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}").map_err(|e| ConfigError::Invalid {
        message: format!("bad interpolation pattern: {}", e),
    })
}

/// Interpolate `${VAR}` and `${VAR:-default}` references in a configuration string
pub fn interpolate_env_vars(content: &str) -> Result<String, ConfigError> {
    interpolate_with(content, |name| env::var(name).ok())
}

/// Interpolate using an arbitrary variable lookup
pub(crate) fn interpolate_with<F>(content: &str, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let pattern = env_var_pattern()?;
    let mut missing: Option<String> = None;

    let result = pattern.replace_all(content, |caps: &Captures| {
        let name = &caps[1];
        match lookup(name).or_else(|| caps.get(2).map(|d| d.as_str().to_string())) {
            Some(value) => value,
            None => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });

    // Report the first missing variable
    if let Some(var) = missing {
        return Err(ConfigError::EnvVarNotFound { var });
    }

    Ok(result.into_owned())
}

/// Build a configuration from `AISENDA_*` environment variables
pub fn from_env() -> Result<ClientConfig, ConfigError> {
    from_lookup(|name| env::var(name).ok())
}

pub(crate) fn from_lookup<F>(lookup: F) -> Result<ClientConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let api_key = lookup(ENV_API_KEY).ok_or_else(|| ConfigError::EnvVarNotFound {
        var: ENV_API_KEY.to_string(),
    })?;

    let mut config = ClientConfig::new(SecretString::new(api_key));
    if let Some(base_url) = lookup(ENV_BASE_URL) {
        config.base_url = base_url;
    }
    if let Some(model) = lookup(ENV_MODEL) {
        config.default_model = model;
    }
    if let Some(model) = lookup(ENV_IMAGE_MODEL) {
        config.image_model = model;
    }
    if let Some(path) = lookup(ENV_HISTORY_PATH) {
        config.history.path = path.into();
    }
    Ok(config)
}
