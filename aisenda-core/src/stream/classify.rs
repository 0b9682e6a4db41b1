//! Wire-format detection for raw response bodies

use serde::{Deserialize, Serialize};

/// Marker the gateway puts in every NDJSON streaming chunk
const CHUNK_OBJECT_MARKER: &str = "\"object\":\"chat.completion.chunk\"";

/// Known response body shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireFormat {
    /// Server-sent events, one `data: <json>` line per chunk
    Sse,
    /// Newline-delimited chunk objects without SSE framing
    Ndjson,
    /// One complete non-streamed JSON document
    Json,
    /// Nothing but whitespace
    Empty,
}

/// Classify a complete response body.
///
/// SSE framing wins over everything else, then the NDJSON chunk marker.
/// Any other non-blank body is treated as a single JSON document.
pub fn classify(body: &str) -> WireFormat {
    if body.lines().any(|line| is_data_line(line.trim())) {
        WireFormat::Sse
    } else if body.contains(CHUNK_OBJECT_MARKER) {
        WireFormat::Ndjson
    } else if body.trim().is_empty() {
        WireFormat::Empty
    } else {
        WireFormat::Json
    }
}

/// Whether a trimmed line is an SSE `data:` field
pub fn is_data_line(line: &str) -> bool {
    line.starts_with("data:")
}

/// Whether the first non-blank line of a body looks like SSE framing.
///
/// Used on the incremental path to decide before the body is complete.
pub fn is_sse_field(line: &str) -> bool {
    let line = line.trim_start();
    line.starts_with(':')
        || ["data:", "event:", "id:", "retry:"]
            .iter()
            .any(|field| line.starts_with(field))
}
