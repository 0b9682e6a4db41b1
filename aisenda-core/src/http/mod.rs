//! HTTP layer for talking to the chat-completion gateway
//!
//! This module implements:
//! - The `Transport` seam, so the normalizer can run against stubs in tests
//! - Per-request options (request id, deadline, headers, cancellation)
//! - Response bodies that are either incremental byte streams or fully buffered
//! - Error mapping for non-2xx responses

pub mod client;
pub mod error;

use crate::providers::ProviderError;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use std::fmt;
use std::pin::Pin;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Largest response body held in memory at once (10 MiB)
pub const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024;

/// Incremental response body
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ProviderError>> + Send>>;

/// Options for one request
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Unique request ID for correlation
    pub request_id: Uuid,

    /// Deadline for the whole request, measured from its start;
    /// `None` uses the client's configured deadline
    pub timeout: Option<Duration>,

    /// Extra headers, applied after the standard ones
    pub headers: Vec<(String, String)>,

    /// Externally owned cancellation handle
    pub cancel: Option<CancellationToken>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            timeout: None,
            headers: Vec::new(),
            cancel: None,
        }
    }
}

impl RequestOptions {
    /// Create new request options with a generated request ID
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the timeout for this request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Deadline for this request, falling back to `default`
    pub fn timeout_or(&self, default: Duration) -> Duration {
        self.timeout.unwrap_or(default)
    }

    /// Add a custom header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attach a cancellation handle the caller keeps
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// A fully prepared POST
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub request_id: Uuid,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: serde_json::Value,
    pub timeout: Duration,
}

/// Body of a gateway response
pub enum ResponseBody {
    /// Chunks as they arrive from the network
    Incremental(ByteStream),
    /// The whole body, read in one go
    Buffered(String),
}

impl ResponseBody {
    /// Whether chunks arrive as they are received
    pub fn is_incremental(&self) -> bool {
        matches!(self, ResponseBody::Incremental(_))
    }

    /// Read the rest of the body into a string
    pub async fn into_text(self) -> Result<String, ProviderError> {
        match self {
            ResponseBody::Buffered(text) => Ok(text),
            ResponseBody::Incremental(mut chunks) => {
                let mut bytes = Vec::new();
                while let Some(chunk) = chunks.next().await {
                    bytes.extend_from_slice(&chunk?);
                }
                Ok(String::from_utf8_lossy(&bytes).into_owned())
            }
        }
    }

    /// View the body as a byte stream; a buffered body becomes a single chunk
    pub fn into_byte_stream(self) -> ByteStream {
        match self {
            ResponseBody::Incremental(chunks) => chunks,
            ResponseBody::Buffered(text) => {
                Box::pin(stream::once(async move { Ok(Bytes::from(text)) }))
            }
        }
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseBody::Incremental(_) => f.write_str("Incremental(..)"),
            ResponseBody::Buffered(text) => write!(f, "Buffered({} bytes)", text.len()),
        }
    }
}

/// Status and body of a gateway response
#[derive(Debug)]
pub struct TransportResponse {
    pub status: u16,
    pub body: ResponseBody,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for anything that can carry a POST to the gateway
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request and return as soon as the status line is known
    async fn post(&self, request: TransportRequest) -> Result<TransportResponse, ProviderError>;
}
