//! Model to provider routing
//!
//! The gateway accepts every model through one chat-completion surface, but
//! callers still pick a request-shaping convention from the model id. The
//! mapping is a fixed substring table checked in order, with Claude as the
//! fallback for anything unrecognised.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider discriminator selected from a model identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderTag {
    /// OpenAI-style chat completions (`gpt*` models)
    Completions,
    /// Cohere models
    Cohere,
    /// Mistral models
    Mistral,
    /// Gemini models
    Gemini,
    /// Anthropic models and the default for unknown ids
    Claude,
}

/// Substring table, checked in order. The first hit wins.
const ROUTES: &[(&str, ProviderTag)] = &[
    ("gpt", ProviderTag::Completions),
    ("cohere", ProviderTag::Cohere),
    ("mistral", ProviderTag::Mistral),
    ("gemini", ProviderTag::Gemini),
];

impl ProviderTag {
    /// Stable string name for this tag
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderTag::Completions => "completions",
            ProviderTag::Cohere => "cohere",
            ProviderTag::Mistral => "mistral",
            ProviderTag::Gemini => "gemini",
            ProviderTag::Claude => "claude",
        }
    }

    /// Endpoint path of the request convention for this tag
    pub fn endpoint(&self) -> &'static str {
        // Every provider is reached through the gateway's OpenAI-compatible surface.
        "/chat/completions"
    }
}

impl fmt::Display for ProviderTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a model identifier to its provider tag.
///
/// Matching is case-sensitive, like the model ids the gateway publishes.
pub fn route_model(model: &str) -> ProviderTag {
    ROUTES
        .iter()
        .find(|(needle, _)| model.contains(needle))
        .map(|(_, tag)| *tag)
        .unwrap_or(ProviderTag::Claude)
}
