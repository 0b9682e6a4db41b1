//! Per-line and whole-body parsing into text fragments

use super::classify::is_data_line;
use crate::protocol::wire::{StreamDelta, WireChunk};
use tracing::{debug, warn};

/// Payload that ends an SSE stream
const DONE_MARKER: &str = "[DONE]";

/// How many characters of a bad payload go into the log line
const LOG_PREVIEW_CHARS: usize = 50;

/// Result of parsing one line of a streamed body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// A well-formed chunk. Either field may be absent.
    Chunk {
        text: Option<String>,
        finish_reason: Option<String>,
    },
    /// End of stream marker
    Done,
    /// Nothing to deliver (blank, non-data field, malformed JSON)
    Skip,
}

/// Parse one SSE line
pub fn parse_sse_line(line: &str) -> LineOutcome {
    let line = line.trim();
    if !is_data_line(line) {
        return LineOutcome::Skip;
    }
    let payload = line["data:".len()..].trim();
    if payload.is_empty() || payload == DONE_MARKER {
        return LineOutcome::Done;
    }
    parse_chunk(payload)
}

/// Parse one NDJSON line
pub fn parse_ndjson_line(line: &str) -> LineOutcome {
    let line = line.trim();
    if line.is_empty() {
        return LineOutcome::Skip;
    }
    parse_chunk(line)
}

fn parse_chunk(payload: &str) -> LineOutcome {
    match serde_json::from_str::<WireChunk>(payload) {
        Ok(chunk) => LineOutcome::Chunk {
            text: chunk.delta_text().map(str::to_owned),
            finish_reason: chunk.finish_reason().map(str::to_owned),
        },
        Err(e) => {
            warn!(
                "Skipping malformed chunk ({}): {}",
                e,
                preview(payload, LOG_PREVIEW_CHARS)
            );
            LineOutcome::Skip
        }
    }
}

/// Extract the full text of a non-streamed JSON body.
///
/// Returns `Ok(None)` when the document parses but carries no text.
pub fn parse_json_body(body: &str) -> Result<Option<String>, serde_json::Error> {
    let chunk: WireChunk = serde_json::from_str(body.trim())?;
    let text = chunk.message_text().map(str::to_owned);
    debug!(
        "Non-streamed body carried {} characters",
        text.as_ref().map(|t| t.chars().count()).unwrap_or(0)
    );
    Ok(text)
}

/// Replay a complete text as fixed-size deltas.
///
/// Slices count Unicode scalar values so a slice never splits a character.
/// The returned deltas concatenate back to `text`; no terminal delta is added.
pub fn replay_slices(text: &str, slice_chars: usize) -> Vec<StreamDelta> {
    let slice_chars = slice_chars.max(1);
    let mut deltas = Vec::new();
    let mut current = String::new();
    let mut count = 0;
    for ch in text.chars() {
        current.push(ch);
        count += 1;
        if count == slice_chars {
            deltas.push(StreamDelta::text(std::mem::take(&mut current), None));
            count = 0;
        }
    }
    if !current.is_empty() {
        deltas.push(StreamDelta::text(current, None));
    }
    deltas
}

fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
