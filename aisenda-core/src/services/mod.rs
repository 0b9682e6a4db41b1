//! Assistant features: facial analysis, copywriting, video scripts, client Q&A
//! and comparison images

mod assistant;
pub mod parse;
pub mod prompts;

pub use assistant::{AssistantService, CompletionOptions, ScriptMode, VideoScriptRequest};
pub use parse::{QaReply, VisionReply};
