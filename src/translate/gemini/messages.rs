//! Universal messages to Gemini turns and back.
//!
//! Gemini has two roles, `user` and `model`, takes the system prompt out of band,
//! and expects every function response answering one model turn to arrive in a
//! single `user` turn. Tool-role messages are therefore buffered while they run
//! contiguously and flushed as one merged turn.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;

use super::types::{GeminiContent, GeminiFunctionResponse, GeminiPart, PartKind};
use crate::error::{ProxyError, Result};
use crate::translate::openai_types::{ChatContent, ChatMessage, ChatToolCall, Role};
use crate::translate::shared::{
    arguments_string, content_blocks, guess_image_mime, new_call_id, ContentBlock, JsonParse,
};

/// A conversation in Gemini form.
#[derive(Debug, Clone, Default)]
pub struct GeminiTurns {
    pub system_instruction: Option<GeminiContent>,
    pub contents: Vec<GeminiContent>,
}

/// Translate a universal message sequence.
///
/// `signatures` maps tool-call ids to continuation tokens looked up ahead of
/// time; a token the client put on the call itself takes precedence.
pub fn to_backend(messages: &[ChatMessage], signatures: &HashMap<String, Vec<u8>>) -> Result<GeminiTurns> {
    if messages.is_empty() {
        return Err(ProxyError::request_shape("messages must not be empty"));
    }

    let mut system_texts: Vec<String> = Vec::new();
    let mut contents: Vec<GeminiContent> = Vec::new();
    let mut pending_responses: Vec<GeminiPart> = Vec::new();
    let mut call_names: HashMap<String, String> = HashMap::new();

    for msg in messages {
        if msg.role != Role::Tool && !pending_responses.is_empty() {
            contents.push(GeminiContent::new("user", std::mem::take(&mut pending_responses)));
        }

        match msg.role {
            Role::System | Role::Developer => {
                let text = msg.text();
                if !text.is_empty() {
                    system_texts.push(text);
                }
            }
            Role::Tool => {
                pending_responses.push(function_response_part(msg, &call_names)?);
            }
            Role::User => {
                let parts = content_parts(msg.content.as_ref())?;
                push_turn(&mut contents, "user", parts);
            }
            Role::Assistant => {
                let calls = msg.tool_calls.as_deref().unwrap_or_default();
                for call in calls {
                    call_names.insert(call.id.clone(), call.function.name.clone());
                }
                let parts = if calls.is_empty() {
                    content_parts(msg.content.as_ref())?
                } else {
                    assistant_call_parts(msg, calls, signatures)
                };
                push_turn(&mut contents, "model", parts);
            }
        }
    }

    if !pending_responses.is_empty() {
        contents.push(GeminiContent::new("user", pending_responses));
    }

    if contents.is_empty() {
        return Err(ProxyError::request_shape(
            "request has no user, assistant or tool messages",
        ));
    }

    let system_instruction = (!system_texts.is_empty()).then(|| GeminiContent {
        role: None,
        parts: vec![GeminiPart::text(system_texts.join("\n\n"))],
    });

    Ok(GeminiTurns {
        system_instruction,
        contents,
    })
}

fn push_turn(contents: &mut Vec<GeminiContent>, role: &str, parts: Vec<GeminiPart>) {
    if parts.is_empty() {
        tracing::debug!(role, "dropping turn with no parts");
        return;
    }
    contents.push(GeminiContent::new(role, parts));
}

fn content_parts(content: Option<&ChatContent>) -> Result<Vec<GeminiPart>> {
    let Some(content) = content else {
        return Ok(Vec::new());
    };
    Ok(content_blocks(content)?
        .into_iter()
        .filter_map(|block| match block {
            ContentBlock::Text(text) if text.is_empty() => None,
            ContentBlock::Text(text) => Some(GeminiPart::text(text)),
            ContentBlock::InlineImage { mime_type, data } => Some(GeminiPart::inline_data(&mime_type, &data)),
            ContentBlock::ImageRef { url } => Some(GeminiPart::file_data(guess_image_mime(&url), &url)),
        })
        .collect())
}

fn assistant_call_parts(
    msg: &ChatMessage,
    calls: &[ChatToolCall],
    signatures: &HashMap<String, Vec<u8>>,
) -> Vec<GeminiPart> {
    let mut parts = Vec::with_capacity(calls.len() + 1);

    let text = msg.text();
    if !text.is_empty() {
        parts.push(GeminiPart::text(text));
    }

    for (i, call) in calls.iter().enumerate() {
        let args = JsonParse::parse(&call.function.arguments).into_arguments();
        // A token echoed on the message applies to its first call.
        let inline = call
            .thought_signature
            .as_deref()
            .or(if i == 0 { msg.thought_signature.as_deref() } else { None })
            .and_then(decode_inline_signature);
        let signature = inline.or_else(|| signatures.get(&call.id).cloned());
        if signature.is_none() {
            tracing::debug!(call_id = %call.id, "replaying function call without thought signature");
        }
        parts.push(GeminiPart::function_call(
            Some(call.id.as_str()).filter(|id| !id.is_empty()),
            &call.function.name,
            args,
            signature.as_deref(),
        ));
    }

    parts
}

fn decode_inline_signature(raw: &str) -> Option<Vec<u8>> {
    if raw.is_empty() {
        return None;
    }
    match BASE64_STANDARD.decode(raw) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            tracing::warn!(error = %e, "client-supplied thought signature is not base64, ignoring");
            None
        }
    }
}

fn function_response_part(msg: &ChatMessage, call_names: &HashMap<String, String>) -> Result<GeminiPart> {
    let call_id = msg
        .tool_call_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ProxyError::request_shape("tool message is missing tool_call_id"))?;

    let name = msg
        .name
        .clone()
        .or_else(|| call_names.get(call_id).cloned())
        .unwrap_or_else(|| call_id.to_string());

    Ok(GeminiPart::function_response(
        Some(call_id),
        &name,
        response_payload(&msg.text()),
    ))
}

/// Objects pass through; anything else is wrapped as `{"result": ..}`.
fn response_payload(raw: &str) -> serde_json::Value {
    match JsonParse::parse(raw) {
        JsonParse::Parsed(value @ serde_json::Value::Object(_)) => value,
        JsonParse::Parsed(value) => serde_json::json!({ "result": value }),
        JsonParse::Empty | JsonParse::Malformed { .. } => serde_json::json!({ "result": raw }),
    }
}

/// Map one Gemini part back to a content block. Thoughts and function parts are not content.
pub fn block_from_gemini(part: &GeminiPart) -> Option<ContentBlock> {
    match part.kind() {
        PartKind::Text { text, thought: false } => Some(ContentBlock::Text(text)),
        PartKind::InlineData(data) => match BASE64_STANDARD.decode(&data.data) {
            Ok(bytes) => Some(ContentBlock::InlineImage {
                mime_type: data.mime_type,
                data: bytes,
            }),
            Err(e) => {
                tracing::warn!(error = %e, "inline data from backend is not base64, skipping");
                None
            }
        },
        PartKind::FileData(data) => Some(ContentBlock::ImageRef { url: data.file_uri }),
        PartKind::Text { thought: true, .. }
        | PartKind::FunctionCall { .. }
        | PartKind::FunctionResponse(_)
        | PartKind::Empty => None,
    }
}

/// Rebuild universal messages from Gemini turns.
pub fn messages_from_turns(turns: &GeminiTurns) -> Vec<ChatMessage> {
    let mut messages = Vec::new();

    if let Some(system) = &turns.system_instruction {
        messages.push(ChatMessage::new(Role::System, joined_text(&system.parts)));
    }

    for turn in &turns.contents {
        let is_model = turn.role.as_deref() == Some("model");
        let mut calls = Vec::new();
        let mut responses: Vec<&GeminiFunctionResponse> = Vec::new();

        for part in &turn.parts {
            match &part.function_call {
                Some(call) => calls.push(ChatToolCall::new(
                    call.id.clone().unwrap_or_else(new_call_id),
                    call.name.clone(),
                    arguments_string(call.args.as_ref()),
                )),
                None => responses.extend(part.function_response.as_ref()),
            }
        }

        let text = joined_text(&turn.parts);
        if is_model {
            let mut msg = ChatMessage::new(Role::Assistant, text);
            if !calls.is_empty() {
                msg.tool_calls = Some(calls);
            }
            messages.push(msg);
        } else if !responses.is_empty() {
            messages.extend(responses.into_iter().map(|r| {
                let mut msg = ChatMessage::tool_result(
                    r.id.clone().unwrap_or_else(|| r.name.clone()),
                    r.response.to_string(),
                );
                msg.name = Some(r.name.clone());
                msg
            }));
        } else {
            messages.push(ChatMessage::new(Role::User, text));
        }
    }

    messages
}

fn joined_text(parts: &[GeminiPart]) -> String {
    parts
        .iter()
        .filter_map(|p| match block_from_gemini(p) {
            Some(ContentBlock::Text(text)) => Some(text),
            _ => None,
        })
        .collect()
}
