//! Stream normalization for chat-completion responses
//!
//! This module implements:
//! - Line decoding of chunked bodies, including split UTF-8 sequences
//! - Body classification (SSE, NDJSON, whole JSON, empty)
//! - Per-line parsing with malformed chunks skipped
//! - The `Normalizer` state machine and its `DeltaStream` view
//! - Callback delivery with a single terminal event
//! - `StreamClient`, which sends requests and wires the pieces together

pub mod callbacks;
pub mod classify;
pub mod client;
pub mod decoder;
pub mod normalizer;
pub mod parser;
pub mod session;

pub use callbacks::{Callbacks, CloseReason, Lifecycle, StreamCallbacks, StreamOutcome};
pub use classify::{classify, WireFormat};
pub use client::{Reply, StreamClient};
pub use normalizer::{DeltaStream, Normalizer, ReplaySettings};
pub use session::{StreamSession, DEFAULT_TIMEOUT};
