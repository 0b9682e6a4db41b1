//! Response shapes read from the gateway and the delta event handed to callers
//!
//! Only the fields the normalizer reads are modelled. Everything is optional
//! so that streamed chunks, whole completions and vendor variations all
//! deserialize into the same structure.

use serde::{Deserialize, Serialize};

/// One response document: a streamed chunk or a whole completion
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireChunk {
    #[serde(default)]
    pub object: Option<String>,

    #[serde(default)]
    pub choices: Vec<WireChoice>,
}

/// A choice in a response document
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireChoice {
    /// Incremental content (streamed chunks)
    #[serde(default)]
    pub delta: Option<WireDelta>,

    /// Full message (non-streamed completions)
    #[serde(default)]
    pub message: Option<WireMessage>,

    /// Legacy completion text
    #[serde(default)]
    pub text: Option<String>,

    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Delta payload of a streamed chunk
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireDelta {
    #[serde(default)]
    pub content: Option<String>,

    /// Chain-of-thought text. Parsed so it can be dropped, never surfaced.
    #[serde(default)]
    pub reasoning_content: Option<String>,
}

/// Message payload of a non-streamed completion
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireMessage {
    #[serde(default)]
    pub content: Option<String>,

    /// Some image models return the picture out of band
    #[serde(default)]
    pub image_url: Option<WireImageUrl>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireImageUrl {
    pub url: String,
}

impl WireChunk {
    fn first(&self) -> Option<&WireChoice> {
        self.choices.first()
    }

    /// Incremental text of a streamed chunk.
    ///
    /// Prefers `delta.content` and falls back to `message.content` for
    /// gateways that answer a streaming request with whole messages.
    pub fn delta_text(&self) -> Option<&str> {
        let choice = self.first()?;
        non_empty(choice.delta.as_ref().and_then(|d| d.content.as_deref()))
            .or_else(|| non_empty(choice.message.as_ref().and_then(|m| m.content.as_deref())))
    }

    /// Full text of a non-streamed completion (`message.content`, then `text`)
    pub fn message_text(&self) -> Option<&str> {
        let choice = self.first()?;
        non_empty(choice.message.as_ref().and_then(|m| m.content.as_deref()))
            .or_else(|| non_empty(choice.text.as_deref()))
    }

    /// Out-of-band image URL of a non-streamed completion
    pub fn message_image(&self) -> Option<&str> {
        self.first()?
            .message
            .as_ref()?
            .image_url
            .as_ref()
            .map(|i| i.url.as_str())
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.first()?.finish_reason.as_deref()
    }
}

fn non_empty(text: Option<&str>) -> Option<&str> {
    text.filter(|t| !t.is_empty())
}

/// Incremental text event produced by the normalizer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDelta {
    /// New text only, never the cumulative buffer
    pub content: String,

    /// Finish reason reported with this chunk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

impl StreamDelta {
    /// A content delta
    pub fn text(content: impl Into<String>, finish_reason: Option<String>) -> Self {
        Self {
            content: content.into(),
            finish_reason,
        }
    }

    /// The empty delta that marks the end of a response
    pub fn terminal(finish_reason: impl Into<String>) -> Self {
        Self {
            content: String::new(),
            finish_reason: Some(finish_reason.into()),
        }
    }

    /// Whether this is the empty end-of-response marker
    pub fn is_terminal(&self) -> bool {
        self.content.is_empty() && self.finish_reason.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reasoning_content_is_not_text() {
        let chunk: WireChunk = serde_json::from_str(
            r#"{"choices":[{"delta":{"reasoning_content":"thinking..."}}]}"#,
        )
        .unwrap();
        assert_eq!(chunk.delta_text(), None);
    }

    #[test]
    fn test_delta_falls_back_to_message() {
        let chunk: WireChunk = serde_json::from_str(
            r#"{"choices":[{"delta":{"content":""},"message":{"content":"whole"}}]}"#,
        )
        .unwrap();
        assert_eq!(chunk.delta_text(), Some("whole"));
    }

    #[test]
    fn test_message_text_falls_back_to_text() {
        let chunk: WireChunk =
            serde_json::from_str(r#"{"choices":[{"text":"legacy","finish_reason":"length"}]}"#)
                .unwrap();
        assert_eq!(chunk.message_text(), Some("legacy"));
        assert_eq!(chunk.finish_reason(), Some("length"));
    }

    #[test]
    fn test_terminal_delta() {
        assert!(StreamDelta::terminal("stop").is_terminal());
        assert!(!StreamDelta::text("a", Some("stop".into())).is_terminal());
    }
}
