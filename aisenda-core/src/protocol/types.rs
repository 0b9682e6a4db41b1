//! Request envelope types for the chat-completion gateway
//!
//! This module contains the data structures sent to the gateway. The design
//! prioritizes:
//! - Type safety through enums for roles and content parts
//! - A wire shape that serializes directly to the OpenAI-compatible body
//! - Builders for the common text and image cases

use crate::providers::ProviderError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// Default MIME type assumed for raw base64 image payloads
const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instructions that guide the model's behavior
    System,
    /// User input message
    User,
    /// Assistant (model) response
    Assistant,
}

/// Content of a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text content
    Text(String),
    /// Typed content parts (text and images)
    Parts(Vec<ContentPart>),
}

/// Individual content part for multimodal messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Text content part
    Text { text: String },
    /// Image reference, usually a base64 data URL
    ImageUrl { image_url: ImageUrl },
}

/// Image reference carried by an image part
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ContentPart {
    /// Create a text part
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    /// Create an image part from a URL or base64 payload.
    ///
    /// Anything that is not already a `data:` URL or an http(s) URL is taken
    /// to be raw base64 JPEG data.
    pub fn image(source: impl Into<String>) -> Self {
        let source = source.into();
        let url = if source.starts_with("data:")
            || source.starts_with("http://")
            || source.starts_with("https://")
        {
            source
        } else {
            format!("data:{};base64,{}", DEFAULT_IMAGE_MIME, source)
        };
        ContentPart::ImageUrl {
            image_url: ImageUrl { url, detail: None },
        }
    }

    /// Create an image part by base64-encoding raw image bytes
    pub fn image_bytes(bytes: &[u8], mime_type: &str) -> Self {
        ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: format!("data:{};base64,{}", mime_type, BASE64.encode(bytes)),
                detail: None,
            },
        }
    }
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: MessageRole,

    /// Content of the message
    pub content: MessageContent,
}

/// Chat completion request envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model identifier to use
    pub model: String,

    /// Messages in the conversation
    pub messages: Vec<Message>,

    /// Whether the gateway should stream the response
    #[serde(default)]
    pub stream: bool,

    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Nucleus sampling parameter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

// ============================================================================
// Builders
// ============================================================================

/// Builder for constructing multimodal messages
pub struct MessageBuilder {
    role: MessageRole,
    parts: Vec<ContentPart>,
}

impl MessageBuilder {
    /// Create a new message builder for a role
    pub fn new(role: MessageRole) -> Self {
        Self {
            role,
            parts: Vec::new(),
        }
    }

    /// Append a text part
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.parts.push(ContentPart::text(text));
        self
    }

    /// Append an image part
    pub fn image(mut self, source: impl Into<String>) -> Self {
        self.parts.push(ContentPart::image(source));
        self
    }

    /// Append several image parts
    pub fn images<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parts.extend(sources.into_iter().map(ContentPart::image));
        self
    }

    /// Build the message.
    ///
    /// A single text part collapses to plain text content.
    pub fn build(mut self) -> Message {
        let single_text =
            self.parts.len() == 1 && matches!(self.parts[0], ContentPart::Text { .. });
        let content = if single_text {
            match self.parts.remove(0) {
                ContentPart::Text { text } => MessageContent::Text(text),
                other => MessageContent::Parts(vec![other]),
            }
        } else {
            MessageContent::Parts(self.parts)
        };
        Message {
            role: self.role,
            content,
        }
    }
}

// ============================================================================
// Convenience constructors
// ============================================================================

impl Message {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::text(MessageRole::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::text(MessageRole::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(MessageRole::Assistant, content)
    }

    /// Create a user message with a prompt followed by image parts
    pub fn user_with_images<I, S>(prompt: impl Into<String>, images: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        MessageBuilder::new(MessageRole::User)
            .text(prompt)
            .images(images)
            .build()
    }

    fn text(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(content.into()),
        }
    }
}

impl ChatRequest {
    /// Create a new non-streaming chat request with model and messages
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: false,
            temperature: None,
            top_p: None,
            max_tokens: None,
        }
    }

    /// Enable or disable streaming
    pub fn with_streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Set temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set top_p for nucleus sampling
    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Set max tokens
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Check the envelope invariants before it is sent
    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.model.trim().is_empty() {
            return Err(ProviderError::InvalidRequest(
                "model identifier is empty".to_string(),
            ));
        }
        if self.messages.is_empty() {
            return Err(ProviderError::InvalidRequest(
                "message list is empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl MessageContent {
    /// Check if content is empty
    pub fn is_empty(&self) -> bool {
        match self {
            MessageContent::Text(s) => s.is_empty(),
            MessageContent::Parts(parts) => parts.is_empty(),
        }
    }

    /// Get text representation
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(s) => Some(s.as_str()),
            MessageContent::Parts(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serializes_to_wire_shape() {
        let request = ChatRequest::new("gpt-5.1", vec![Message::user("hi")])
            .with_streaming(true)
            .with_temperature(0.5);

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "model": "gpt-5.1",
                "messages": [{"role": "user", "content": "hi"}],
                "stream": true,
                "temperature": 0.5
            })
        );
    }

    #[test]
    fn test_image_parts_serialize_as_image_url() {
        let message = Message::user_with_images("look", ["abc123"]);
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["content"][0], json!({"type": "text", "text": "look"}));
        assert_eq!(
            value["content"][1],
            json!({"type": "image_url", "image_url": {"url": "data:image/jpeg;base64,abc123"}})
        );
    }

    #[test]
    fn test_data_urls_are_kept() {
        let part = ContentPart::image("data:image/png;base64,AAAA");
        match part {
            ContentPart::ImageUrl { image_url } => {
                assert_eq!(image_url.url, "data:image/png;base64,AAAA")
            }
            _ => panic!("expected image part"),
        }
    }

    #[test]
    fn test_image_bytes_are_encoded() {
        let part = ContentPart::image_bytes(b"hi", "image/png");
        match part {
            ContentPart::ImageUrl { image_url } => {
                assert_eq!(image_url.url, "data:image/png;base64,aGk=")
            }
            _ => panic!("expected image part"),
        }
    }

    #[test]
    fn test_builder_single_text_collapses() {
        let message = MessageBuilder::new(MessageRole::System).text("rules").build();
        assert_eq!(message.content.as_text(), Some("rules"));
    }

    #[test]
    fn test_validate_rejects_empty_messages() {
        let request = ChatRequest::new("gpt-5.1", vec![]);
        assert!(matches!(
            request.validate(),
            Err(ProviderError::InvalidRequest(_))
        ));
        let request = ChatRequest::new(" ", vec![Message::user("x")]);
        assert!(request.validate().is_err());
    }
}
