//! Configuration schema structures with serde support

use super::secrets::SecretString;
use crate::stream::ReplaySettings;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Gateway base URL used when none is configured
pub const DEFAULT_BASE_URL: &str = "https://yunwu.ai/v1";

/// Text model used when none is configured
pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";

/// Image-capable model used when none is configured
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-3-pro-image-preview";

/// Root configuration for the assistant client
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Gateway base URL; `/chat/completions` is appended
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token for the gateway (supports environment variable interpolation)
    pub api_key: SecretString,

    /// Model for text and vision requests
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Model for image generation requests
    #[serde(default = "default_image_model")]
    pub image_model: String,

    /// Session deadline in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// TCP connect timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default)]
    pub stream: StreamSettings,

    #[serde(default)]
    pub history: HistoryConfig,
}

/// How response bodies are read and replayed
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StreamSettings {
    /// Read bodies as they arrive; `false` buffers the whole body first
    #[serde(default = "default_true")]
    pub incremental: bool,

    /// Characters per synthesized delta when replaying a whole JSON body
    #[serde(default = "default_replay_chunk_chars")]
    pub replay_chunk_chars: usize,

    /// Pause between replayed deltas, in milliseconds
    #[serde(default)]
    pub replay_delay_ms: u64,

    /// Snapshot cadence for tracked analyses, in characters (0 disables)
    #[serde(default = "default_snapshot_every_chars")]
    pub snapshot_every_chars: usize,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            incremental: true,
            replay_chunk_chars: default_replay_chunk_chars(),
            replay_delay_ms: 0,
            snapshot_every_chars: default_snapshot_every_chars(),
        }
    }
}

impl StreamSettings {
    pub fn replay(&self) -> ReplaySettings {
        ReplaySettings {
            slice_chars: self.replay_chunk_chars,
            delay: Duration::from_millis(self.replay_delay_ms),
        }
    }
}

/// Where local history is kept
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HistoryConfig {
    /// Directory holding the history documents
    #[serde(default = "default_history_path")]
    pub path: PathBuf,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: default_history_path(),
        }
    }
}

impl ClientConfig {
    /// Configuration with every default and the given API key
    pub fn new(api_key: impl Into<SecretString>) -> Self {
        Self {
            base_url: default_base_url(),
            api_key: api_key.into(),
            default_model: default_model(),
            image_model: default_image_model(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            stream: StreamSettings::default(),
            history: HistoryConfig::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn with_history_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.history.path = path.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_image_model() -> String {
    DEFAULT_IMAGE_MODEL.to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_replay_chunk_chars() -> usize {
    10
}

fn default_snapshot_every_chars() -> usize {
    500
}

fn default_history_path() -> PathBuf {
    PathBuf::from(".aisenda")
}
