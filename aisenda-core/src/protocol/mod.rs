//! Protocol module for request and response structures
//!
//! `types` holds the request envelope sent to the gateway; `wire` holds the
//! tolerant response shapes and the `StreamDelta` event produced from them.

pub mod types;
pub mod wire;

pub use types::{
    ChatRequest, ContentPart, ImageUrl, Message, MessageBuilder, MessageContent, MessageRole,
};
pub use wire::{StreamDelta, WireChunk};
