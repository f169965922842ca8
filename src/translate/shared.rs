//! Pieces both backends share: content-block decoding, argument parsing,
//! id synthesis, finish-reason precedence and the token estimate.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;

use super::openai_types::{ChatContent, ContentPart, FinishReason};
use crate::error::{ProxyError, Result};

/// One decoded unit of message content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentBlock {
    Text(String),
    InlineImage { mime_type: String, data: Vec<u8> },
    ImageRef { url: String },
}

/// Decode free-form message content into ordered blocks.
///
/// A string becomes one text block. Data-URI images are decoded into bytes and
/// their MIME type; any other URL stays a reference.
pub fn content_blocks(content: &ChatContent) -> Result<Vec<ContentBlock>> {
    match content {
        ChatContent::Text(text) => Ok(vec![ContentBlock::Text(text.clone())]),
        ChatContent::Parts(parts) => parts
            .iter()
            .map(|part| match part {
                ContentPart::Text { text } => Ok(ContentBlock::Text(text.clone())),
                ContentPart::ImageUrl { image_url } => decode_image_url(image_url.url()),
            })
            .collect(),
    }
}

pub fn decode_image_url(url: &str) -> Result<ContentBlock> {
    let Some(rest) = url.strip_prefix("data:") else {
        return Ok(ContentBlock::ImageRef {
            url: url.to_string(),
        });
    };

    let (header, data) = rest
        .split_once(',')
        .ok_or_else(|| ProxyError::request_shape("Malformed data URI: missing ',' separator"))?;
    let mime_type = header.split(';').next().unwrap_or_default();
    if mime_type.is_empty() {
        return Err(ProxyError::request_shape("Malformed data URI: missing MIME type"));
    }

    let data = BASE64_STANDARD
        .decode(data.trim())
        .map_err(|e| ProxyError::request_shape(format!("Inline image is not valid base64: {e}")))?;

    Ok(ContentBlock::InlineImage {
        mime_type: mime_type.to_string(),
        data,
    })
}

/// MIME type for a remote image, guessed from its extension.
pub fn guess_image_mime(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
    match path.rsplit('.').next() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        _ => "image/jpeg",
    }
}

/// Outcome of parsing a JSON-encoded string (tool arguments or tool results).
#[derive(Debug, Clone, PartialEq)]
pub enum JsonParse {
    Parsed(serde_json::Value),
    Empty,
    Malformed { raw: String, error: String },
}

impl JsonParse {
    pub fn parse(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return JsonParse::Empty;
        }
        match serde_json::from_str(raw) {
            Ok(value) => JsonParse::Parsed(value),
            Err(e) => JsonParse::Malformed {
                raw: raw.to_string(),
                error: e.to_string(),
            },
        }
    }

    /// Tool-call arguments as an object. Anything unusable becomes `{}`.
    pub fn into_arguments(self) -> serde_json::Value {
        match self {
            JsonParse::Parsed(value @ serde_json::Value::Object(_)) => value,
            JsonParse::Parsed(other) => {
                tracing::debug!(arguments = %other, "tool arguments are not an object, using {{}}");
                empty_object()
            }
            JsonParse::Empty => empty_object(),
            JsonParse::Malformed { raw, error } => {
                tracing::debug!(%error, raw = %truncate(&raw, 200), "malformed tool arguments, using {{}}");
                empty_object()
            }
        }
    }
}

pub fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// Re-serialize emitted function-call arguments into the universal JSON string.
pub fn arguments_string(args: Option<&serde_json::Value>) -> String {
    match args {
        None | Some(serde_json::Value::Null) => "{}".to_string(),
        Some(value) => serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string()),
    }
}

pub fn new_call_id() -> String {
    format!("call_{}", &uuid::Uuid::new_v4().simple().to_string()[..24])
}

pub fn new_completion_id() -> String {
    format!("chatcmpl-{}", &uuid::Uuid::new_v4().simple().to_string()[..29])
}

pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Tool calls win over truncation, truncation wins over a normal stop.
pub fn finish_reason(has_tool_calls: bool, truncated: bool) -> FinishReason {
    if has_tool_calls {
        FinishReason::ToolCalls
    } else if truncated {
        FinishReason::Length
    } else {
        FinishReason::Stop
    }
}

/// Rough token count: about four characters per token. Not backend ground truth.
pub fn estimate_tokens(chars: usize) -> u64 {
    chars.div_ceil(4) as u64
}

pub fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
