//! Aisenda Core Library
//!
//! Streaming chat-completion client for the Aisenda beauty-consulting
//! assistant. Gateway responses arrive as SSE, NDJSON or a single JSON
//! document; the `stream` module turns all three into the same sequence of
//! text deltas, delivered either as a `Stream` or through lifecycle
//! callbacks with exactly one terminal event.
//!
//! ```no_run
//! use aisenda_core::config::ClientConfig;
//! use aisenda_core::http::RequestOptions;
//! use aisenda_core::protocol::{ChatRequest, Message};
//! use aisenda_core::stream::StreamClient;
//! use futures::StreamExt;
//!
//! # async fn run() -> Result<(), aisenda_core::providers::ProviderError> {
//! let config = ClientConfig::new("sk-...");
//! let client = StreamClient::from_config(&config)?;
//! let request = ChatRequest::new(&config.default_model, vec![Message::user("Hello")])
//!     .with_streaming(true);
//! let mut deltas = client.stream(request, RequestOptions::new()).await?;
//! while let Some(delta) = deltas.next().await {
//!     print!("{}", delta?.content);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod history;
pub mod http;
pub mod protocol;
pub mod providers;
pub mod services;
pub mod stream;

/// Returns the version of the Aisenda Core library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
