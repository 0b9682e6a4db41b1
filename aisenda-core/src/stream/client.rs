//! Client entry points for streamed chat completions

use super::callbacks::{drive, Lifecycle, StreamCallbacks, StreamOutcome};
use super::classify::{classify, WireFormat};
use super::normalizer::{DeltaStream, Normalizer, ReplaySettings};
use super::session::StreamSession;
use crate::config::{ClientConfig, SecretString};
use crate::http::client::HttpClient;
use crate::http::error::map_http_error;
use crate::http::{RequestOptions, ResponseBody, Transport, TransportRequest};
use crate::protocol::{ChatRequest, WireChunk};
use crate::providers::{route_model, ProviderError, ProviderResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Chat completions path appended to the base URL
const COMPLETIONS_PATH: &str = "/chat/completions";

/// Text and out-of-band image of a non-streamed reply
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub image_url: Option<String>,
}

/// Sends chat requests to the gateway and normalizes the responses
#[derive(Clone)]
pub struct StreamClient {
    transport: Arc<dyn Transport>,
    base_url: String,
    api_key: SecretString,
    replay: ReplaySettings,
    snapshot_every: usize,
    timeout: Duration,
}

impl StreamClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        base_url: impl Into<String>,
        api_key: SecretString,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            api_key,
            replay: ReplaySettings::default(),
            snapshot_every: 0,
            timeout: super::session::DEFAULT_TIMEOUT,
        }
    }

    /// Build a client over `reqwest` from configuration
    pub fn from_config(config: &ClientConfig) -> ProviderResult<Self> {
        let http = HttpClient::with_config(config.connect_timeout(), 10)?
            .incremental(config.stream.incremental);
        Ok(Self::with_transport(Arc::new(http), config))
    }

    /// Build a client over any transport using configuration values
    pub fn with_transport(transport: Arc<dyn Transport>, config: &ClientConfig) -> Self {
        Self::new(transport, config.base_url.clone(), config.api_key.clone())
            .with_replay(config.stream.replay())
            .with_snapshot_every(config.stream.snapshot_every_chars)
            .with_timeout(config.timeout())
    }

    pub fn with_replay(mut self, replay: ReplaySettings) -> Self {
        self.replay = replay;
        self
    }

    pub fn with_snapshot_every(mut self, chars: usize) -> Self {
        self.snapshot_every = chars;
        self
    }

    /// Deadline for requests whose options set none
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full URL of the chat completions endpoint
    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), COMPLETIONS_PATH)
    }

    /// Request options carrying this client's deadline explicitly
    pub fn request_options(&self) -> RequestOptions {
        RequestOptions::new().with_timeout(self.timeout)
    }

    /// Deadline that applies to a request sent with `options`
    pub fn effective_timeout(&self, options: &RequestOptions) -> Duration {
        options.timeout_or(self.timeout)
    }

    fn build_request(
        &self,
        request: &ChatRequest,
        options: &RequestOptions,
    ) -> ProviderResult<TransportRequest> {
        let accept = if request.stream {
            "text/event-stream"
        } else {
            "application/json"
        };
        let mut headers = vec![
            ("Accept".to_string(), accept.to_string()),
            (
                "Authorization".to_string(),
                format!("Bearer {}", self.api_key.expose_secret()),
            ),
            ("Content-Type".to_string(), "application/json".to_string()),
            ("X-Request-ID".to_string(), options.request_id.to_string()),
        ];
        for (name, value) in &options.headers {
            if name.eq_ignore_ascii_case("authorization") {
                continue;
            }
            headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
            headers.push((name.clone(), value.clone()));
        }

        Ok(TransportRequest {
            request_id: options.request_id,
            url: self.endpoint(),
            headers,
            body: serde_json::to_value(request)?,
            timeout: self.effective_timeout(options),
        })
    }

    /// Send the request and return a normalizer over the response body.
    ///
    /// Fails with `Http` for a non-2xx status, before any delta is produced.
    pub async fn open(
        &self,
        request: ChatRequest,
        options: RequestOptions,
    ) -> ProviderResult<Normalizer> {
        let (body, session) = self.send(request, options).await?;
        Ok(Normalizer::new(body, session, self.replay.clone()))
    }

    async fn send(
        &self,
        request: ChatRequest,
        options: RequestOptions,
    ) -> ProviderResult<(ResponseBody, StreamSession)> {
        request.validate()?;

        let cancel = options.cancel.clone().unwrap_or_default();
        let timeout = self.effective_timeout(&options);
        let session = StreamSession::new(cancel.clone(), timeout)
            .with_id(options.request_id)
            .with_snapshot_every(self.snapshot_every);
        let deadline = session.deadline();

        info!(
            "Opening {} request for model {} via {} [request_id: {}]",
            if request.stream { "streaming" } else { "buffered" },
            request.model,
            route_model(&request.model),
            options.request_id
        );
        debug!("POST {} [request_id: {}]", self.endpoint(), options.request_id);

        let transport_request = self.build_request(&request, &options)?;
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            _ = tokio::time::sleep_until(deadline) => return Err(ProviderError::Timeout(timeout)),
            response = self.transport.post(transport_request) => response?,
        };

        if !response.is_success() {
            let status = response.status;
            let body = tokio::time::timeout_at(deadline, response.body.into_text())
                .await
                .ok()
                .and_then(Result::ok);
            warn!(
                "Gateway returned status {} [request_id: {}]",
                status, options.request_id
            );
            return Err(map_http_error(status, body.as_deref(), options.request_id));
        }

        Ok((response.body, session))
    }

    /// Send the request and return the deltas as a stream
    pub async fn stream(
        &self,
        request: ChatRequest,
        options: RequestOptions,
    ) -> ProviderResult<DeltaStream> {
        Ok(self.open(request, options).await?.into_stream())
    }

    /// Send the request and report its lifecycle through callbacks.
    ///
    /// `on_open` fires first, then one `on_message` per delta, then exactly
    /// one of `on_close` or `on_error`. Cancellation resolves to an outcome
    /// with `CloseReason::Cancelled`.
    pub async fn fetch_stream<C: StreamCallbacks + ?Sized>(
        &self,
        request: ChatRequest,
        options: RequestOptions,
        callbacks: &mut C,
    ) -> ProviderResult<StreamOutcome> {
        let mut lifecycle = Lifecycle::new(callbacks);
        lifecycle.open();
        match self.open(request, options).await {
            Ok(normalizer) => drive(normalizer, &mut lifecycle).await,
            Err(e) => lifecycle.fail(e, None),
        }
    }

    /// Send the request and return the whole response text
    pub async fn complete(
        &self,
        request: ChatRequest,
        options: RequestOptions,
    ) -> ProviderResult<String> {
        self.stream(request, options).await?.text().await
    }

    /// Send a non-streaming request and return the reply's text and image.
    ///
    /// Falls back to delta extraction when the gateway streams anyway.
    pub async fn complete_reply(
        &self,
        request: ChatRequest,
        options: RequestOptions,
    ) -> ProviderResult<Reply> {
        let (body, session) = self.send(request.with_streaming(false), options).await?;
        let cancel = session.cancel_token().clone();
        let timeout = session.timeout();
        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            _ = tokio::time::sleep_until(session.deadline()) => return Err(ProviderError::Timeout(timeout)),
            body = body.into_text() => body?,
        };

        if matches!(classify(&body), WireFormat::Json) {
            match serde_json::from_str::<WireChunk>(body.trim()) {
                Ok(chunk) => {
                    return Ok(Reply {
                        text: chunk.message_text().unwrap_or_default().to_string(),
                        image_url: chunk.message_image().map(str::to_string),
                    })
                }
                Err(e) => return Err(ProviderError::Parse(e.to_string())),
            }
        }

        let replay = ReplaySettings {
            delay: Duration::ZERO,
            ..self.replay.clone()
        };
        let text = Normalizer::new(ResponseBody::Buffered(body), session, replay)
            .into_stream()
            .text()
            .await?;
        Ok(Reply {
            text,
            image_url: None,
        })
    }
}
