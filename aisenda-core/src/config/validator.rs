//! Configuration validation utilities

use super::error::ValidationError;
use super::schema::ClientConfig;
use tracing::warn;
use url::Url;

/// Checks a loaded configuration and reports the first offending field
#[derive(Debug, Default)]
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, config: &ClientConfig) -> Result<(), ValidationError> {
        self.validate_base_url(&config.base_url)?;
        self.validate_api_key(config)?;

        if config.default_model.trim().is_empty() {
            return Err(ValidationError::required("default_model"));
        }
        if config.image_model.trim().is_empty() {
            return Err(ValidationError::required("image_model"));
        }
        if config.timeout_secs == 0 {
            return Err(ValidationError::out_of_range(
                "timeout_secs",
                "must be greater than 0",
            ));
        }
        if config.connect_timeout_secs == 0 {
            return Err(ValidationError::out_of_range(
                "connect_timeout_secs",
                "must be greater than 0",
            ));
        }
        if config.stream.replay_chunk_chars == 0 {
            return Err(ValidationError::out_of_range(
                "stream.replay_chunk_chars",
                "must be greater than 0",
            ));
        }
        if config.history.path.as_os_str().is_empty() {
            return Err(ValidationError::required("history.path"));
        }

        Ok(())
    }

    fn validate_base_url(&self, base_url: &str) -> Result<(), ValidationError> {
        let url = Url::parse(base_url)
            .map_err(|e| ValidationError::invalid_url("base_url", e.to_string()))?;
        match url.scheme() {
            "https" => Ok(()),
            "http" => {
                warn!("Gateway base URL {} is not using TLS", base_url);
                Ok(())
            }
            other => Err(ValidationError::invalid_url(
                "base_url",
                format!("unsupported scheme '{}'", other),
            )),
        }
    }

    fn validate_api_key(&self, config: &ClientConfig) -> Result<(), ValidationError> {
        if config.api_key.is_empty() {
            return Err(ValidationError::required("api_key"));
        }
        if config.api_key.expose_secret().contains("${") {
            return Err(ValidationError::invalid_format(
                "api_key",
                "unresolved environment variable reference",
            ));
        }
        Ok(())
    }
}
