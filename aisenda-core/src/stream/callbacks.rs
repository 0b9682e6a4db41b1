//! Lifecycle callbacks for a streamed request
//!
//! `on_open` fires once before anything else. Every delta then goes to
//! `on_message`, and the request ends with exactly one of `on_close` or
//! `on_error`. Caller cancellation ends through `on_close` with
//! `CloseReason::Cancelled`.

use super::normalizer::Normalizer;
use super::session::StreamSession;
use crate::protocol::wire::StreamDelta;
use crate::providers::ProviderError;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Why a stream closed without error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloseReason {
    /// The gateway finished the response
    Completed,
    /// The caller cancelled the request
    Cancelled,
}

/// Receiver for stream lifecycle events
pub trait StreamCallbacks: Send {
    fn on_open(&mut self) {}

    fn on_message(&mut self, delta: &StreamDelta) {
        let _ = delta;
    }

    fn on_error(&mut self, error: &ProviderError) {
        let _ = error;
    }

    fn on_close(&mut self, reason: CloseReason) {
        let _ = reason;
    }
}

/// Callbacks that ignore every event
impl StreamCallbacks for () {}

type OpenFn<'a> = Box<dyn FnMut() + Send + 'a>;
type MessageFn<'a> = Box<dyn FnMut(&StreamDelta) + Send + 'a>;
type ErrorFn<'a> = Box<dyn FnMut(&ProviderError) + Send + 'a>;
type CloseFn<'a> = Box<dyn FnMut(CloseReason) + Send + 'a>;

/// Closure-based callbacks; unset events are ignored
#[derive(Default)]
pub struct Callbacks<'a> {
    open: Option<OpenFn<'a>>,
    message: Option<MessageFn<'a>>,
    error: Option<ErrorFn<'a>>,
    close: Option<CloseFn<'a>>,
}

impl<'a> Callbacks<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_open(mut self, f: impl FnMut() + Send + 'a) -> Self {
        self.open = Some(Box::new(f));
        self
    }

    pub fn on_message(mut self, f: impl FnMut(&StreamDelta) + Send + 'a) -> Self {
        self.message = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnMut(&ProviderError) + Send + 'a) -> Self {
        self.error = Some(Box::new(f));
        self
    }

    pub fn on_close(mut self, f: impl FnMut(CloseReason) + Send + 'a) -> Self {
        self.close = Some(Box::new(f));
        self
    }
}

impl StreamCallbacks for Callbacks<'_> {
    fn on_open(&mut self) {
        if let Some(f) = self.open.as_mut() {
            f();
        }
    }

    fn on_message(&mut self, delta: &StreamDelta) {
        if let Some(f) = self.message.as_mut() {
            f(delta);
        }
    }

    fn on_error(&mut self, error: &ProviderError) {
        if let Some(f) = self.error.as_mut() {
            f(error);
        }
    }

    fn on_close(&mut self, reason: CloseReason) {
        if let Some(f) = self.close.as_mut() {
            f(reason);
        }
    }
}

/// Result of a stream that ended without error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOutcome {
    /// Concatenated text of every delta delivered
    pub text: String,
    /// Last finish reason seen
    pub finish_reason: Option<String>,
    pub end: CloseReason,
}

impl StreamOutcome {
    fn from_session(session: Option<&StreamSession>, end: CloseReason) -> Self {
        Self {
            text: session.map(|s| s.text().to_string()).unwrap_or_default(),
            finish_reason: session.and_then(|s| s.finish_reason().map(str::to_string)),
            end,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.end == CloseReason::Cancelled
    }
}

/// Guard that forwards events to callbacks and keeps the terminal event unique
pub struct Lifecycle<'c, C: StreamCallbacks + ?Sized> {
    callbacks: &'c mut C,
    opened: bool,
    terminated: bool,
}

impl<'c, C: StreamCallbacks + ?Sized> Lifecycle<'c, C> {
    pub fn new(callbacks: &'c mut C) -> Self {
        Self {
            callbacks,
            opened: false,
            terminated: false,
        }
    }

    pub fn open(&mut self) {
        if !self.opened && !self.terminated {
            self.opened = true;
            self.callbacks.on_open();
        }
    }

    pub fn message(&mut self, delta: &StreamDelta) {
        if !self.terminated {
            self.callbacks.on_message(delta);
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Close normally
    pub fn close(&mut self, session: Option<&StreamSession>) -> StreamOutcome {
        self.terminate(CloseReason::Completed);
        StreamOutcome::from_session(session, CloseReason::Completed)
    }

    /// End with an error. Cancellation is reported as a close, not an error.
    pub fn fail(
        &mut self,
        error: ProviderError,
        session: Option<&StreamSession>,
    ) -> Result<StreamOutcome, ProviderError> {
        if error.is_cancelled() {
            self.terminate(CloseReason::Cancelled);
            return Ok(StreamOutcome::from_session(session, CloseReason::Cancelled));
        }
        if !self.terminated {
            self.terminated = true;
            self.callbacks.on_error(&error);
        }
        Err(error)
    }

    fn terminate(&mut self, reason: CloseReason) {
        if !self.terminated {
            self.terminated = true;
            self.callbacks.on_close(reason);
        }
    }
}

/// Pump a normalizer through callbacks until it ends
pub async fn drive<C: StreamCallbacks + ?Sized>(
    mut normalizer: Normalizer,
    lifecycle: &mut Lifecycle<'_, C>,
) -> Result<StreamOutcome, ProviderError> {
    while let Some(item) = normalizer.next_delta().await {
        match item {
            Ok(delta) => lifecycle.message(&delta),
            Err(e) => return lifecycle.fail(e, Some(normalizer.session())),
        }
    }
    debug!(
        "Delivered {} characters [request_id: {}]",
        normalizer.session().char_count(),
        normalizer.session().id()
    );
    Ok(lifecycle.close(Some(normalizer.session())))
}
