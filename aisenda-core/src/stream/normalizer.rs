//! Turns one gateway response body into a sequence of text deltas
//!
//! The normalizer reads the body line by line. SSE bodies are handled as the
//! lines arrive; anything else is buffered and classified once the body is
//! complete. Whichever shape arrives, callers see the same `StreamDelta`
//! sequence followed by an empty terminal delta whenever text was produced.

use super::classify::{classify, is_sse_field, WireFormat};
use super::decoder::LineDecoder;
use super::parser::{parse_json_body, parse_ndjson_line, parse_sse_line, replay_slices, LineOutcome};
use super::session::StreamSession;
use crate::http::{ByteStream, ResponseBody, MAX_RESPONSE_SIZE};
use crate::protocol::wire::StreamDelta;
use crate::providers::ProviderError;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Finish reason used when the gateway never reports one
const DEFAULT_FINISH_REASON: &str = "stop";

/// How a non-streamed body is replayed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaySettings {
    /// Characters per synthesized delta
    pub slice_chars: usize,
    /// Pause between deltas when the body was read in one go
    pub delay: Duration,
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self {
            slice_chars: 10,
            delay: Duration::ZERO,
        }
    }
}

#[derive(Debug)]
enum Mode {
    /// No non-blank line seen yet
    Undetected,
    /// SSE framing, lines handled as they arrive
    Sse,
    /// Anything else; classified once the body is complete
    Buffering(String),
}

/// Pull-based delta producer for one session
pub struct Normalizer {
    source: Option<ByteStream>,
    paced: bool,
    decoder: LineDecoder,
    mode: Mode,
    pending: VecDeque<StreamDelta>,
    session: StreamSession,
    replay: ReplaySettings,
    last_finish: Option<String>,
    produced: bool,
    stopped: bool,
    input_done: bool,
    finished: bool,
    dispatched: usize,
    max_buffered: usize,
}

impl Normalizer {
    pub fn new(body: ResponseBody, session: StreamSession, replay: ReplaySettings) -> Self {
        let paced = !body.is_incremental();
        Self {
            source: Some(body.into_byte_stream()),
            paced,
            decoder: LineDecoder::new(),
            mode: Mode::Undetected,
            pending: VecDeque::new(),
            session,
            replay,
            last_finish: None,
            produced: false,
            stopped: false,
            input_done: false,
            finished: false,
            dispatched: 0,
            max_buffered: MAX_RESPONSE_SIZE,
        }
    }

    /// Limit on body bytes held while waiting to classify or finish a line
    pub fn with_max_buffered(mut self, bytes: usize) -> Self {
        self.max_buffered = bytes;
        self
    }

    pub fn session(&self) -> &StreamSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut StreamSession {
        &mut self.session
    }

    pub fn into_session(self) -> StreamSession {
        self.session
    }

    /// Produce the next delta.
    ///
    /// Returns `None` once the response is complete. After an error has been
    /// returned, every later call returns `None`.
    pub async fn next_delta(&mut self) -> Option<Result<StreamDelta, ProviderError>> {
        loop {
            if self.finished {
                return None;
            }

            if let Some(delta) = self.pending.pop_front() {
                if let Err(e) = self.pace().await {
                    return Some(Err(self.fail(e)));
                }
                if let Some(e) = self.interrupted() {
                    return Some(Err(self.fail(e)));
                }
                self.session.record(&delta);
                self.dispatched += 1;
                return Some(Ok(delta));
            }

            if self.input_done {
                self.finished = true;
                info!(
                    "Stream closed after {} deltas, {} characters [request_id: {}]",
                    self.dispatched,
                    self.session.char_count(),
                    self.session.id()
                );
                return None;
            }

            if let Err(e) = self.pull().await {
                return Some(Err(self.fail(e)));
            }
        }
    }

    /// Consume the normalizer as a `Stream` of deltas
    pub fn into_stream(self) -> DeltaStream {
        let inner = stream::unfold(self, |mut normalizer| async move {
            normalizer
                .next_delta()
                .await
                .map(|item| (item, normalizer))
        });
        DeltaStream {
            inner: Box::pin(inner),
        }
    }

    fn interrupted(&self) -> Option<ProviderError> {
        if self.session.is_cancelled() {
            Some(ProviderError::Cancelled)
        } else if self.session.is_expired() {
            Some(ProviderError::Timeout(self.session.timeout()))
        } else {
            None
        }
    }

    fn fail(&mut self, e: ProviderError) -> ProviderError {
        match &e {
            ProviderError::Cancelled => {
                info!("Stream cancelled [request_id: {}]", self.session.id())
            }
            other => warn!("Stream failed [request_id: {}]: {}", self.session.id(), other),
        }
        self.finished = true;
        self.pending.clear();
        self.source = None;
        e
    }

    /// Wait between deltas of a body that was read in one go
    async fn pace(&mut self) -> Result<(), ProviderError> {
        if !self.paced || self.replay.delay.is_zero() || self.dispatched == 0 {
            return Ok(());
        }
        let cancel = self.session.cancel_token().clone();
        let timeout = self.session.timeout();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ProviderError::Cancelled),
            _ = tokio::time::sleep_until(self.session.deadline()) => Err(ProviderError::Timeout(timeout)),
            _ = tokio::time::sleep(self.replay.delay) => Ok(()),
        }
    }

    /// Read one more chunk from the body, racing cancellation and the deadline
    async fn pull(&mut self) -> Result<(), ProviderError> {
        let cancel = self.session.cancel_token().clone();
        let deadline = self.session.deadline();
        let timeout = self.session.timeout();

        let Some(source) = self.source.as_mut() else {
            self.complete_input();
            return Ok(());
        };

        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            _ = tokio::time::sleep_until(deadline) => return Err(ProviderError::Timeout(timeout)),
            next = source.next() => next,
        };

        match next {
            Some(Ok(chunk)) => {
                for line in self.decoder.push(&chunk) {
                    self.handle_line(line);
                    if self.stopped {
                        self.complete_input();
                        return Ok(());
                    }
                }
                let held = self.buffered_len();
                if held > self.max_buffered {
                    return Err(ProviderError::Parse(format!(
                        "Buffered response of {} bytes exceeds maximum {} [request_id: {}]",
                        held,
                        self.max_buffered,
                        self.session.id()
                    )));
                }
                Ok(())
            }
            Some(Err(e)) => Err(e),
            None => {
                if let Some(rest) = self.decoder.finish() {
                    self.handle_line(rest);
                }
                self.complete_input();
                Ok(())
            }
        }
    }

    /// Bytes held for a body not yet classified plus any unfinished line
    fn buffered_len(&self) -> usize {
        let body = match &self.mode {
            Mode::Buffering(body) => body.len(),
            Mode::Undetected | Mode::Sse => 0,
        };
        body + self.decoder.pending()
    }

    fn handle_line(&mut self, line: String) {
        match self.mode {
            Mode::Undetected => {
                if line.trim().is_empty() {
                    return;
                }
                if is_sse_field(&line) {
                    debug!("Detected SSE framing [request_id: {}]", self.session.id());
                    self.mode = Mode::Sse;
                    self.handle_sse_line(&line);
                } else {
                    let mut body = line;
                    body.push('\n');
                    self.mode = Mode::Buffering(body);
                }
            }
            Mode::Sse => self.handle_sse_line(&line),
            Mode::Buffering(ref mut body) => {
                body.push_str(&line);
                body.push('\n');
            }
        }
    }

    fn handle_sse_line(&mut self, line: &str) {
        if self.stopped {
            return;
        }
        match parse_sse_line(line) {
            LineOutcome::Chunk {
                text,
                finish_reason,
            } => self.emit(text, finish_reason),
            LineOutcome::Done => {
                debug!("End-of-stream marker [request_id: {}]", self.session.id());
                self.stopped = true;
            }
            LineOutcome::Skip => {}
        }
    }

    fn emit(&mut self, text: Option<String>, finish_reason: Option<String>) {
        if finish_reason.is_some() {
            self.last_finish = finish_reason.clone();
        }
        if let Some(text) = text {
            self.produced = true;
            self.pending.push_back(StreamDelta::text(text, finish_reason));
        }
    }

    /// No more input will be read: flush buffered bodies and queue the terminal delta
    fn complete_input(&mut self) {
        if self.input_done {
            return;
        }
        self.input_done = true;
        self.source = None;

        if let Mode::Buffering(body) = std::mem::replace(&mut self.mode, Mode::Undetected) {
            self.dispatch_body(&body);
        }

        if self.produced {
            let reason = self
                .last_finish
                .take()
                .unwrap_or_else(|| DEFAULT_FINISH_REASON.to_string());
            self.pending.push_back(StreamDelta::terminal(reason));
        }
    }

    fn dispatch_body(&mut self, body: &str) {
        let format = classify(body);
        debug!(
            "Classified {} byte body as {:?} [request_id: {}]",
            body.len(),
            format,
            self.session.id()
        );
        match format {
            WireFormat::Sse => {
                for line in body.lines() {
                    if self.stopped {
                        break;
                    }
                    self.handle_sse_line(line);
                }
            }
            WireFormat::Ndjson => {
                for line in body.lines() {
                    if let LineOutcome::Chunk {
                        text,
                        finish_reason,
                    } = parse_ndjson_line(line)
                    {
                        self.emit(text, finish_reason);
                    }
                }
            }
            WireFormat::Json => match parse_json_body(body) {
                Ok(Some(text)) => {
                    let slices = replay_slices(&text, self.replay.slice_chars);
                    self.produced |= !slices.is_empty();
                    self.pending.extend(slices);
                    self.last_finish = Some(DEFAULT_FINISH_REASON.to_string());
                }
                Ok(None) => debug!("Response carried no text [request_id: {}]", self.session.id()),
                Err(e) => error!(
                    "Failed to parse response [request_id: {}]: {}",
                    self.session.id(),
                    e
                ),
            },
            WireFormat::Empty => {}
        }
    }
}

/// Lazy, finite, non-restartable sequence of deltas.
///
/// Ends after the response completes or right after yielding an error.
/// Caller cancellation is yielded as `ProviderError::Cancelled`.
pub struct DeltaStream {
    inner: BoxStream<'static, Result<StreamDelta, ProviderError>>,
}

impl DeltaStream {
    /// Drain the stream and return the response text
    pub async fn text(mut self) -> Result<String, ProviderError> {
        let mut text = String::new();
        while let Some(delta) = self.inner.next().await {
            text.push_str(&delta?.content);
        }
        Ok(text)
    }
}

impl Stream for DeltaStream {
    type Item = Result<StreamDelta, ProviderError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}
