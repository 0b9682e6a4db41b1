//! HTTP transport implementation using reqwest

use crate::http::{
    ResponseBody, Transport, TransportRequest, TransportResponse, MAX_RESPONSE_SIZE,
};
use crate::providers::ProviderError;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, ClientBuilder, Response};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Default user agent
const USER_AGENT: &str = concat!("aisenda/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client with connection pooling
#[derive(Clone)]
pub struct HttpClient {
    /// The underlying reqwest client
    client: Arc<Client>,

    /// Maximum buffered response size to prevent OOM
    max_response_size: usize,

    /// Hand out bodies as byte streams rather than reading them whole
    incremental: bool,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_config(Duration::from_secs(10), 10)
    }

    /// Create a new HTTP client with custom configuration.
    ///
    /// There is no client-wide request timeout: each request carries its own.
    pub fn with_config(
        connect_timeout: Duration,
        max_idle_per_host: usize,
    ) -> Result<Self, ProviderError> {
        let client = ClientBuilder::new()
            .pool_max_idle_per_host(max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(connect_timeout)
            .user_agent(USER_AGENT)
            .gzip(true)
            .build()
            .map_err(|e| {
                ProviderError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client: Arc::new(client),
            max_response_size: MAX_RESPONSE_SIZE,
            incremental: true,
        })
    }

    /// Choose between streamed bodies and whole-body reads
    pub fn incremental(mut self, incremental: bool) -> Self {
        self.incremental = incremental;
        self
    }

    /// Check response size to prevent OOM
    fn check_content_length(&self, response: &Response) -> Result<(), ProviderError> {
        if let Some(content_length) = response.content_length() {
            if content_length as usize > self.max_response_size {
                return Err(ProviderError::Parse(format!(
                    "Response size {} exceeds maximum {}",
                    content_length, self.max_response_size
                )));
            }
        }

        Ok(())
    }
}

fn map_send_error(e: reqwest::Error, request: &TransportRequest) -> ProviderError {
    if e.is_timeout() {
        warn!("Request timeout [request_id: {}]", request.request_id);
        ProviderError::Timeout(request.timeout)
    } else if e.is_connect() {
        error!(
            "Connection error [request_id: {}]: {}",
            request.request_id, e
        );
        ProviderError::Network(format!(
            "Connection failed: {} [request_id: {}]",
            e, request.request_id
        ))
    } else {
        error!("Request error [request_id: {}]: {}", request.request_id, e);
        ProviderError::Network(format!("{} [request_id: {}]", e, request.request_id))
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn post(&self, request: TransportRequest) -> Result<TransportResponse, ProviderError> {
        info!(
            "Sending request to {} [request_id: {}]",
            request.url, request.request_id
        );

        let mut req_builder = self
            .client
            .post(&request.url)
            .timeout(request.timeout)
            .body(serde_json::to_vec(&request.body)?);

        for (key, value) in &request.headers {
            req_builder = req_builder.header(key.as_str(), value.as_str());
        }

        let response = req_builder
            .send()
            .await
            .map_err(|e| map_send_error(e, &request))?;

        let status = response.status().as_u16();
        debug!(
            "Response status: {} [request_id: {}]",
            status, request.request_id
        );

        self.check_content_length(&response)?;

        let body = if self.incremental {
            let timeout = request.timeout;
            ResponseBody::Incremental(Box::pin(response.bytes_stream().map(move |chunk| {
                chunk.map_err(|e| {
                    if e.is_timeout() {
                        ProviderError::Timeout(timeout)
                    } else {
                        ProviderError::Network(format!("Failed to read response body: {}", e))
                    }
                })
            })))
        } else {
            let text = response.text().await.map_err(|e| {
                ProviderError::Network(format!(
                    "Failed to read response body: {} [request_id: {}]",
                    e, request.request_id
                ))
            })?;
            if text.len() > self.max_response_size {
                return Err(ProviderError::Parse(format!(
                    "Response size {} exceeds maximum {} [request_id: {}]",
                    text.len(),
                    self.max_response_size,
                    request.request_id
                )));
            }
            ResponseBody::Buffered(text)
        };

        Ok(TransportResponse { status, body })
    }
}
