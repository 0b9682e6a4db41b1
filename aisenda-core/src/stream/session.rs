//! Per-request stream state

use crate::protocol::wire::StreamDelta;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Default session deadline, measured from request start
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// State owned by one in-flight request.
///
/// Holds the accumulated text, the cancellation handle and the deadline.
/// Dropped when the request closes, fails or is cancelled.
#[derive(Debug)]
pub struct StreamSession {
    id: Uuid,
    text: String,
    char_count: usize,
    cancel: CancellationToken,
    timeout: Duration,
    deadline: Instant,
    finish_reason: Option<String>,
    snapshot_every: Option<usize>,
    snapshot_mark: usize,
}

impl StreamSession {
    /// Start a session now with the given deadline
    pub fn new(cancel: CancellationToken, timeout: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: String::new(),
            char_count: 0,
            cancel,
            timeout,
            deadline: Instant::now() + timeout,
            finish_reason: None,
            snapshot_every: None,
            snapshot_mark: 0,
        }
    }

    /// Use a specific session id (normally the request id)
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    /// Ask for a snapshot every time the text grows by `chars` characters
    pub fn with_snapshot_every(mut self, chars: usize) -> Self {
        self.snapshot_every = (chars > 0).then_some(chars);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Text received so far
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    /// Number of characters received so far
    pub fn char_count(&self) -> usize {
        self.char_count
    }

    /// Last finish reason reported by the gateway
    pub fn finish_reason(&self) -> Option<&str> {
        self.finish_reason.as_deref()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Record a finish reason seen on the wire
    pub fn note_finish_reason(&mut self, reason: Option<String>) {
        if reason.is_some() {
            self.finish_reason = reason;
        }
    }

    /// Append a dispatched delta to the buffer
    pub fn record(&mut self, delta: &StreamDelta) {
        self.text.push_str(&delta.content);
        self.char_count += delta.content.chars().count();
        self.note_finish_reason(delta.finish_reason.clone());
    }

    /// Whether the text has crossed the next snapshot boundary.
    ///
    /// Moves the boundary forward when it returns true, so each boundary
    /// fires once even when one delta jumps over it.
    pub fn take_snapshot(&mut self) -> bool {
        let Some(every) = self.snapshot_every else {
            return false;
        };
        let mark = self.char_count / every;
        if mark > self.snapshot_mark {
            self.snapshot_mark = mark;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_accumulates_text() {
        let mut session = StreamSession::new(CancellationToken::new(), DEFAULT_TIMEOUT);
        session.record(&StreamDelta::text("你好", None));
        session.record(&StreamDelta::text(" world", Some("stop".into())));
        assert_eq!(session.text(), "你好 world");
        assert_eq!(session.char_count(), 8);
        assert_eq!(session.finish_reason(), Some("stop"));
        assert!(!session.is_expired());
    }

    #[tokio::test]
    async fn test_snapshot_boundaries_fire_once() {
        let mut session =
            StreamSession::new(CancellationToken::new(), DEFAULT_TIMEOUT).with_snapshot_every(5);
        session.record(&StreamDelta::text("abcd", None));
        assert!(!session.take_snapshot());
        session.record(&StreamDelta::text("efghijkl", None));
        assert!(session.take_snapshot());
        assert!(!session.take_snapshot());
        session.record(&StreamDelta::text("mn", None));
        assert!(!session.take_snapshot());
        session.record(&StreamDelta::text("o", None));
        assert!(session.take_snapshot());
    }

    #[tokio::test]
    async fn test_cancel_is_observed() {
        let token = CancellationToken::new();
        let session = StreamSession::new(token.clone(), DEFAULT_TIMEOUT);
        token.cancel();
        assert!(session.is_cancelled());
    }
}
