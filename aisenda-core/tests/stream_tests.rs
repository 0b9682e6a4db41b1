//! Integration tests for response normalization and the callback lifecycle
//!
//! A scripted transport hands the client canned bodies, either as a list of
//! network chunks or as one buffered string, so every wire shape can be
//! checked end to end without a server.

use aisenda_core::config::SecretString;
use aisenda_core::http::{
    ByteStream, RequestOptions, ResponseBody, Transport, TransportRequest, TransportResponse,
};
use aisenda_core::protocol::{ChatRequest, Message, StreamDelta};
use aisenda_core::providers::{ProviderError, ProviderResult};
use aisenda_core::stream::{
    Callbacks, CloseReason, Normalizer, ReplaySettings, StreamCallbacks, StreamClient,
    StreamSession, DEFAULT_TIMEOUT,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use proptest::prelude::*;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How the scripted body is delivered
#[derive(Clone)]
enum Body {
    /// Network chunks, optionally followed by a body that never ends
    Chunks { chunks: Vec<String>, hang: bool },
    /// The whole body at once
    Whole(String),
}

struct Scripted {
    status: u16,
    body: Body,
}

impl Scripted {
    fn chunks(chunks: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            status: 200,
            body: Body::Chunks {
                chunks: chunks.iter().map(|c| c.to_string()).collect(),
                hang: false,
            },
        })
    }

    fn hanging(chunks: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            status: 200,
            body: Body::Chunks {
                chunks: chunks.iter().map(|c| c.to_string()).collect(),
                hang: true,
            },
        })
    }

    fn whole(body: &str) -> Arc<Self> {
        Arc::new(Self {
            status: 200,
            body: Body::Whole(body.to_string()),
        })
    }
}

fn byte_stream(chunks: Vec<String>, hang: bool) -> ByteStream {
    let head = stream::iter(
        chunks
            .into_iter()
            .map(|c| Ok::<_, ProviderError>(Bytes::from(c))),
    );
    if hang {
        Box::pin(head.chain(stream::pending()))
    } else {
        Box::pin(head)
    }
}

#[async_trait]
impl Transport for Scripted {
    async fn post(&self, _request: TransportRequest) -> ProviderResult<TransportResponse> {
        let body = match self.body.clone() {
            Body::Chunks { chunks, hang } => ResponseBody::Incremental(byte_stream(chunks, hang)),
            Body::Whole(text) => ResponseBody::Buffered(text),
        };
        Ok(TransportResponse {
            status: self.status,
            body,
        })
    }
}

/// Records every lifecycle event in order
#[derive(Default)]
struct Recorder {
    events: Vec<String>,
    deltas: Vec<StreamDelta>,
}

impl StreamCallbacks for Recorder {
    fn on_open(&mut self) {
        self.events.push("open".into());
    }

    fn on_message(&mut self, delta: &StreamDelta) {
        self.events.push("message".into());
        self.deltas.push(delta.clone());
    }

    fn on_error(&mut self, error: &ProviderError) {
        self.events.push(format!("error:{}", error));
    }

    fn on_close(&mut self, reason: CloseReason) {
        self.events.push(format!("close:{:?}", reason));
    }
}

impl Recorder {
    fn terminal_events(&self) -> usize {
        self.events
            .iter()
            .filter(|e| e.starts_with("error") || e.starts_with("close"))
            .count()
    }
}

fn client(transport: Arc<Scripted>) -> StreamClient {
    StreamClient::new(transport, "https://gateway.test/v1", SecretString::new("sk-test"))
}

fn request() -> ChatRequest {
    ChatRequest::new("gemini-3-flash-preview", vec![Message::user("hello")]).with_streaming(true)
}

fn sse(text: &str) -> String {
    format!(
        "data: {}\n\n",
        serde_json::json!({"choices": [{"delta": {"content": text}}]})
    )
}

fn texts(deltas: &[StreamDelta]) -> Vec<&str> {
    deltas.iter().map(|d| d.content.as_str()).collect()
}

#[tokio::test]
async fn test_sse_stream_ends_at_done_marker() {
    let body = format!("{}{}data: [DONE]\n\n{}", sse("Hel"), sse("lo"), sse("ignored"));
    let client = client(Scripted::chunks(&[&body]));

    let mut recorder = Recorder::default();
    let outcome = client
        .fetch_stream(request(), RequestOptions::new(), &mut recorder)
        .await
        .unwrap();

    assert_eq!(outcome.text, "Hello");
    assert_eq!(outcome.end, CloseReason::Completed);
    assert_eq!(texts(&recorder.deltas), vec!["Hel", "lo", ""]);
    assert_eq!(recorder.deltas[2], StreamDelta::terminal("stop"));
    assert_eq!(
        recorder.events,
        vec!["open", "message", "message", "message", "close:Completed"]
    );
}

#[tokio::test]
async fn test_line_split_across_network_chunks() {
    // The multi-byte character is cut in the middle of its encoding
    let body = sse("你好");
    let bytes = body.as_bytes();
    let cut = body.find('你').unwrap() + 1;

    let source: ByteStream = Box::pin(stream::iter(vec![
        Ok(Bytes::copy_from_slice(&bytes[..cut])),
        Ok(Bytes::copy_from_slice(&bytes[cut..])),
    ]));
    let session = StreamSession::new(CancellationToken::new(), DEFAULT_TIMEOUT);
    let normalizer = Normalizer::new(
        ResponseBody::Incremental(source),
        session,
        ReplaySettings::default(),
    );
    assert_eq!(normalizer.into_stream().text().await.unwrap(), "你好");
}

#[tokio::test]
async fn test_finish_reason_carried_to_terminal_delta() {
    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n",
        "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"length\"}]}\n",
        "data: [DONE]\n",
    );
    let deltas: Vec<_> = client(Scripted::chunks(&[body]))
        .stream(request(), RequestOptions::new())
        .await
        .unwrap()
        .collect()
        .await;
    let deltas: Vec<StreamDelta> = deltas.into_iter().map(Result::unwrap).collect();

    assert_eq!(deltas.len(), 2);
    assert_eq!(deltas[0].content, "Hi");
    assert_eq!(deltas[1], StreamDelta::terminal("length"));
}

#[tokio::test]
async fn test_malformed_lines_are_skipped() {
    let body = format!(
        "{}data: {{not json\n: keep-alive\nevent: ping\n{}data: [DONE]\n",
        sse("a"),
        sse("b")
    );
    let text = client(Scripted::chunks(&[&body]))
        .complete(request(), RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(text, "ab");
}

#[tokio::test]
async fn test_reasoning_content_is_never_delivered() {
    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"reasoning_content\":\"thinking...\"}}]}\n",
        "data: {\"choices\":[{\"delta\":{\"reasoning_content\":\"more\",\"content\":\"answer\"}}]}\n",
        "data: [DONE]\n",
    );
    let mut recorder = Recorder::default();
    client(Scripted::chunks(&[body]))
        .fetch_stream(request(), RequestOptions::new(), &mut recorder)
        .await
        .unwrap();
    assert_eq!(texts(&recorder.deltas), vec!["answer", ""]);
}

#[tokio::test]
async fn test_same_input_gives_same_deltas() {
    let body = format!(
        "{}data: {{broken\n{}data: [DONE]\n",
        sse("first "),
        sse("second")
    );
    let client = client(Scripted::chunks(&[&body[..7], &body[7..]]));

    let mut runs = Vec::new();
    for _ in 0..2 {
        let mut recorder = Recorder::default();
        client
            .fetch_stream(request(), RequestOptions::new(), &mut recorder)
            .await
            .unwrap();
        runs.push((recorder.events, recorder.deltas));
    }
    assert_eq!(runs[0], runs[1]);
    assert_eq!(texts(&runs[0].1), vec!["first ", "second", ""]);
}

#[tokio::test]
async fn test_json_body_is_replayed_in_slices() {
    let body = r#"{"choices":[{"message":{"content":"0123456789a"},"finish_reason":"length"}]}"#;
    let mut recorder = Recorder::default();
    let outcome = client(Scripted::whole(body))
        .fetch_stream(request(), RequestOptions::new(), &mut recorder)
        .await
        .unwrap();

    assert_eq!(texts(&recorder.deltas), vec!["0123456789", "a", ""]);
    assert_eq!(recorder.deltas[2].finish_reason.as_deref(), Some("stop"));
    assert_eq!(outcome.text, "0123456789a");
}

#[tokio::test]
async fn test_json_body_split_into_chunks() {
    let body = r#"{"choices":[{"message":{"content":"split body"}}]}"#;
    let (head, tail) = body.split_at(17);
    let text = client(Scripted::chunks(&[head, tail]))
        .complete(request(), RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(text, "split body");
}

#[tokio::test]
async fn test_ndjson_body() {
    let body = concat!(
        "{\"object\":\"chat.completion.chunk\",\"choices\":[{\"delta\":{\"content\":\"one \"}}]}\n",
        "{\"object\":\"chat.completion.chunk\",\"choices\":[{\"delta\":{\"content\":\"two\"},\"finish_reason\":\"stop\"}]}\n",
    );
    let mut recorder = Recorder::default();
    client(Scripted::chunks(&[body]))
        .fetch_stream(request(), RequestOptions::new(), &mut recorder)
        .await
        .unwrap();
    assert_eq!(texts(&recorder.deltas), vec!["one ", "two", ""]);
    assert_eq!(recorder.deltas[2].finish_reason.as_deref(), Some("stop"));
}

#[tokio::test]
async fn test_empty_body_closes_without_messages() {
    let mut recorder = Recorder::default();
    let outcome = client(Scripted::whole("  \n"))
        .fetch_stream(request(), RequestOptions::new(), &mut recorder)
        .await
        .unwrap();
    assert!(outcome.text.is_empty());
    assert_eq!(recorder.events, vec!["open", "close:Completed"]);
}

#[tokio::test]
async fn test_cancel_closes_once_without_error() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let options = RequestOptions::new().with_cancel(cancel);

    let events = Mutex::new(Vec::new());
    let push = |event: String| events.lock().unwrap().push(event);
    let mut callbacks = Callbacks::new()
        .on_open(|| push("open".to_string()))
        .on_message(|delta: &StreamDelta| {
            trigger.cancel();
            push(format!("message:{}", delta.content));
        })
        .on_error(|_e: &ProviderError| push("error".to_string()))
        .on_close(|reason| push(format!("close:{:?}", reason)));

    let body = sse("first");
    let outcome = client(Scripted::hanging(&[&body]))
        .fetch_stream(request(), options, &mut callbacks)
        .await
        .unwrap();
    drop(callbacks);

    assert!(outcome.is_cancelled());
    assert_eq!(outcome.text, "first");
    assert_eq!(
        events.into_inner().unwrap(),
        vec!["open", "message:first", "close:Cancelled"]
    );
}

#[tokio::test]
async fn test_cancel_before_send() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut recorder = Recorder::default();
    let outcome = client(Scripted::chunks(&[]))
        .fetch_stream(request(), RequestOptions::new().with_cancel(cancel), &mut recorder)
        .await
        .unwrap();
    assert!(outcome.is_cancelled());
    assert_eq!(recorder.events, vec!["open", "close:Cancelled"]);
}

#[tokio::test]
async fn test_stream_yields_cancelled_error() {
    let cancel = CancellationToken::new();
    let body = sse("partial");
    let mut deltas = client(Scripted::hanging(&[&body]))
        .stream(request(), RequestOptions::new().with_cancel(cancel.clone()))
        .await
        .unwrap();

    assert_eq!(deltas.next().await.unwrap().unwrap().content, "partial");
    cancel.cancel();
    assert!(matches!(
        deltas.next().await,
        Some(Err(ProviderError::Cancelled))
    ));
    assert!(deltas.next().await.is_none());
}

#[tokio::test]
async fn test_deadline_reports_timeout_error() {
    let options = RequestOptions::new().with_timeout(Duration::from_millis(50));
    let body = sse("slow");
    let mut recorder = Recorder::default();
    let err = client(Scripted::hanging(&[&body]))
        .fetch_stream(request(), options, &mut recorder)
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Timeout(_)));
    assert_eq!(recorder.terminal_events(), 1);
    assert_eq!(recorder.events[0], "open");
    assert_eq!(recorder.events[1], "message");
    assert!(recorder.events[2].starts_with("error:"));
}

#[tokio::test]
async fn test_client_deadline_applies_to_stock_options() {
    let body = sse("slow");
    let client = client(Scripted::hanging(&[&body])).with_timeout(Duration::from_millis(50));

    let result = tokio::time::timeout(
        Duration::from_secs(2),
        client.complete(request(), RequestOptions::new()),
    )
    .await
    .expect("client deadline ends the request");
    assert!(matches!(
        result,
        Err(ProviderError::Timeout(t)) if t == Duration::from_millis(50)
    ));
}

#[tokio::test]
async fn test_request_deadline_overrides_client_deadline() {
    let client = client(Scripted::hanging(&[])).with_timeout(Duration::from_secs(30));
    let options = RequestOptions::new().with_timeout(Duration::from_millis(40));

    let err = tokio::time::timeout(Duration::from_secs(2), client.complete(request(), options))
        .await
        .expect("request deadline ends the request")
        .unwrap_err();
    assert!(matches!(err, ProviderError::Timeout(t) if t == Duration::from_millis(40)));
}

#[tokio::test]
async fn test_http_error_before_any_message() {
    let transport = Arc::new(Scripted {
        status: 503,
        body: Body::Whole(r#"{"error":{"message":"overloaded"}}"#.to_string()),
    });
    let mut recorder = Recorder::default();
    let err = client(transport)
        .fetch_stream(request(), RequestOptions::new(), &mut recorder)
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(503));
    assert_eq!(recorder.events.len(), 2);
    assert!(recorder.events[1].contains("overloaded"));
}

#[tokio::test]
async fn test_body_read_failure_goes_to_on_error() {
    struct Broken;

    #[async_trait]
    impl Transport for Broken {
        async fn post(&self, _request: TransportRequest) -> ProviderResult<TransportResponse> {
            let chunks: ByteStream = Box::pin(stream::iter(vec![
                Ok(Bytes::from(sse("ok"))),
                Err(ProviderError::Network("connection reset".into())),
            ]));
            Ok(TransportResponse {
                status: 200,
                body: ResponseBody::Incremental(chunks),
            })
        }
    }

    let client = StreamClient::new(
        Arc::new(Broken),
        "https://gateway.test/v1",
        SecretString::new("sk-test"),
    );
    let mut recorder = Recorder::default();
    let err = client
        .fetch_stream(request(), RequestOptions::new(), &mut recorder)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Network(_)));
    assert_eq!(texts(&recorder.deltas), vec!["ok"]);
    assert_eq!(recorder.terminal_events(), 1);
}

#[tokio::test]
async fn test_replay_delay_paces_buffered_bodies() {
    let body = r#"{"choices":[{"message":{"content":"abcdef"}}]}"#;
    let client = client(Scripted::whole(body)).with_replay(ReplaySettings {
        slice_chars: 2,
        delay: Duration::from_millis(20),
    });

    let started = tokio::time::Instant::now();
    let text = client
        .complete(request(), RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(text, "abcdef");
    // Three slices and the terminal delta, paused between each
    assert!(started.elapsed() >= Duration::from_millis(60));
}

#[tokio::test]
async fn test_cancel_during_paced_replay() {
    let body = r#"{"choices":[{"message":{"content":"abcdefghij"}}]}"#;
    let client = client(Scripted::whole(body)).with_replay(ReplaySettings {
        slice_chars: 2,
        delay: Duration::from_millis(200),
    });
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        trigger.cancel();
    });

    let started = tokio::time::Instant::now();
    let mut recorder = Recorder::default();
    let outcome = client
        .fetch_stream(request(), RequestOptions::new().with_cancel(cancel), &mut recorder)
        .await
        .unwrap();

    // The first slice goes out at once; cancellation lands in the pause before the second
    assert!(outcome.is_cancelled());
    assert_eq!(outcome.text, "ab");
    assert_eq!(texts(&recorder.deltas), vec!["ab"]);
    assert_eq!(recorder.events, vec!["open", "message", "close:Cancelled"]);
    assert_eq!(recorder.terminal_events(), 1);
    assert!(started.elapsed() < Duration::from_millis(200));
}

fn capped(chunks: Vec<String>, max_buffered: usize) -> Normalizer {
    let source: ByteStream = Box::pin(stream::iter(
        chunks
            .into_iter()
            .map(|c| Ok::<_, ProviderError>(Bytes::from(c))),
    ));
    let session = StreamSession::new(CancellationToken::new(), DEFAULT_TIMEOUT);
    Normalizer::new(
        ResponseBody::Incremental(source),
        session,
        ReplaySettings::default(),
    )
    .with_max_buffered(max_buffered)
}

#[tokio::test]
async fn test_unclassified_body_over_limit_fails() {
    let line = concat!(
        "{\"object\":\"chat.completion.chunk\",",
        "\"choices\":[{\"delta\":{\"content\":\"0123456789\"}}]}\n"
    );
    let chunks = vec![line.to_string(); 64];

    let err = capped(chunks, 1024).into_stream().text().await.unwrap_err();
    assert!(matches!(err, ProviderError::Parse(_)));
}

#[tokio::test]
async fn test_unterminated_line_over_limit_fails() {
    let chunks = vec!["x".repeat(100); 20];
    let err = capped(chunks, 1024).into_stream().text().await.unwrap_err();
    assert!(matches!(err, ProviderError::Parse(_)));
}

#[tokio::test]
async fn test_long_sse_stream_is_not_capped() {
    let chunks: Vec<String> = (0..64).map(|i| sse(&format!("part{:02} ", i))).collect();
    let text = capped(chunks, 1024).into_stream().text().await.unwrap();
    assert!(text.starts_with("part00 part01 "));
    assert!(text.ends_with("part63 "));
}

#[tokio::test]
async fn test_normalizer_is_done_after_end() {
    let source: ByteStream = Box::pin(stream::iter(vec![Ok(Bytes::from(sse("x")))]));
    let session = StreamSession::new(CancellationToken::new(), DEFAULT_TIMEOUT);
    let mut normalizer = Normalizer::new(
        ResponseBody::Incremental(source),
        session,
        ReplaySettings::default(),
    );
    assert_eq!(normalizer.next_delta().await.unwrap().unwrap().content, "x");
    assert!(normalizer.next_delta().await.unwrap().unwrap().is_terminal());
    assert!(normalizer.next_delta().await.is_none());
    assert!(normalizer.next_delta().await.is_none());
    assert_eq!(normalizer.session().text(), "x");
}

proptest! {
    #[test]
    fn prop_deltas_concatenate_to_full_text(
        parts in prop::collection::vec("\\PC{1,12}", 1..8),
        cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..6),
    ) {
        let mut body = parts.iter().map(|p| sse(p)).collect::<String>();
        body.push_str("data: [DONE]\n");
        let bytes = body.into_bytes();

        let mut points: Vec<usize> = cuts.iter().map(|i| i.index(bytes.len())).collect();
        points.sort_unstable();
        points.dedup();
        let mut chunks = Vec::new();
        let mut start = 0;
        for point in points {
            chunks.push(Ok(Bytes::copy_from_slice(&bytes[start..point])));
            start = point;
        }
        chunks.push(Ok(Bytes::copy_from_slice(&bytes[start..])));

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let text = runtime.block_on(async move {
            let source: ByteStream = Box::pin(stream::iter(chunks));
            let session = StreamSession::new(CancellationToken::new(), DEFAULT_TIMEOUT);
            Normalizer::new(ResponseBody::Incremental(source), session, ReplaySettings::default())
                .into_stream()
                .text()
                .await
        }).unwrap();

        prop_assert_eq!(text, parts.concat());
    }
}
