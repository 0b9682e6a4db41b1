//! Post-processing of model replies

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Separator between variants in multi-answer replies
const VARIANT_SEPARATOR: &str = "---";

/// Placeholder left where an inline image was removed
const IMAGE_PLACEHOLDER: &str = "[image]";

static INLINE_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[image\]\((data:image/[^;]+;base64,[^)]+)\)")
        .expect("valid inline image pattern")
});

/// Text and optional image of a vision reply
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisionReply {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Model the request was sent to
    #[serde(default)]
    pub model: String,
}

/// One styled answer to a client question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaReply {
    pub style: String,
    pub content: String,
}

/// Split a multi-answer reply on `---`, dropping empty pieces
pub fn split_variants(text: &str) -> Vec<String> {
    text.split(VARIANT_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `style：content` or `style: content` answers separated by `---`
pub fn parse_qa_replies(text: &str) -> Vec<QaReply> {
    split_variants(text)
        .iter()
        .map(|reply| parse_qa_reply(reply))
        .collect()
}

fn parse_qa_reply(reply: &str) -> QaReply {
    let reply = ["风格：", "Style:", "style:"]
        .iter()
        .find_map(|prefix| reply.strip_prefix(prefix))
        .unwrap_or(reply)
        .trim();

    let split = reply
        .split_once('：')
        .or_else(|| reply.split_once(':'));
    match split {
        Some((style, content)) => QaReply {
            style: style.trim().to_string(),
            content: content.trim().to_string(),
        },
        None => QaReply {
            style: String::new(),
            content: reply.to_string(),
        },
    }
}

/// Pull an inline markdown data-URL image out of a reply.
///
/// The first `![image](data:image/...;base64,...)` is replaced with a
/// placeholder. An out-of-band image URL takes precedence over an inline one.
pub fn extract_inline_image(text: &str, image_url: Option<String>) -> VisionReply {
    let (text, inline) = match INLINE_IMAGE.captures(text) {
        Some(caps) => {
            let image = caps[1].to_string();
            let replaced = INLINE_IMAGE.replace(text, IMAGE_PLACEHOLDER).trim().to_string();
            (replaced, Some(image))
        }
        None => (text.to_string(), None),
    };

    VisionReply {
        text,
        image: image_url.filter(|u| !u.is_empty()).or(inline),
        model: String::new(),
    }
}
