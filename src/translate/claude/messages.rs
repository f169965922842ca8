//! Universal messages to Claude turns and back.
//!
//! Claude accepts a `system` string and two roles. Each tool-role message becomes
//! its own `user` turn with a single `tool_result` block.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;

use super::types::{ClaudeBlock, ClaudeMessage, ClaudeRole, ImageSource};
use crate::error::{ProxyError, Result};
use crate::translate::openai_types::{ChatContent, ChatMessage, ChatToolCall, Role};
use crate::translate::shared::{arguments_string, content_blocks, ContentBlock, JsonParse};

#[derive(Debug, Clone, Default)]
pub struct ClaudeTurns {
    pub system: Option<String>,
    pub messages: Vec<ClaudeMessage>,
}

pub fn to_backend(messages: &[ChatMessage]) -> Result<ClaudeTurns> {
    if messages.is_empty() {
        return Err(ProxyError::request_shape("messages must not be empty"));
    }

    let mut system_texts = Vec::new();
    let mut turns = Vec::new();

    for msg in messages {
        match msg.role {
            Role::System | Role::Developer => {
                let text = msg.text();
                if !text.is_empty() {
                    system_texts.push(text);
                }
            }
            Role::Tool => {
                let tool_use_id = msg
                    .tool_call_id
                    .clone()
                    .filter(|id| !id.is_empty())
                    .ok_or_else(|| ProxyError::request_shape("tool message is missing tool_call_id"))?;
                turns.push(ClaudeMessage {
                    role: ClaudeRole::User,
                    content: vec![ClaudeBlock::ToolResult {
                        tool_use_id,
                        content: msg.text(),
                        is_error: None,
                    }],
                });
            }
            Role::User => push_turn(&mut turns, ClaudeRole::User, content_to_blocks(msg.content.as_ref())?),
            Role::Assistant => {
                let blocks = match msg.tool_calls.as_deref() {
                    Some(calls) if !calls.is_empty() => assistant_call_blocks(msg, calls),
                    _ => content_to_blocks(msg.content.as_ref())?,
                };
                push_turn(&mut turns, ClaudeRole::Assistant, blocks);
            }
        }
    }

    if turns.is_empty() {
        return Err(ProxyError::request_shape(
            "request has no user, assistant or tool messages",
        ));
    }

    Ok(ClaudeTurns {
        system: (!system_texts.is_empty()).then(|| system_texts.join("\n\n")),
        messages: turns,
    })
}

fn push_turn(turns: &mut Vec<ClaudeMessage>, role: ClaudeRole, content: Vec<ClaudeBlock>) {
    if content.is_empty() {
        tracing::debug!(?role, "dropping turn with no content");
        return;
    }
    turns.push(ClaudeMessage { role, content });
}

fn content_to_blocks(content: Option<&ChatContent>) -> Result<Vec<ClaudeBlock>> {
    let Some(content) = content else {
        return Ok(Vec::new());
    };
    Ok(content_blocks(content)?
        .into_iter()
        .filter_map(|block| match block {
            ContentBlock::Text(text) if text.is_empty() => None,
            ContentBlock::Text(text) => Some(ClaudeBlock::Text { text }),
            ContentBlock::InlineImage { mime_type, data } => Some(ClaudeBlock::Image {
                source: ImageSource::Base64 {
                    media_type: mime_type,
                    data: BASE64_STANDARD.encode(data),
                },
            }),
            ContentBlock::ImageRef { url } => Some(ClaudeBlock::Image {
                source: ImageSource::Url { url },
            }),
        })
        .collect())
}

fn assistant_call_blocks(msg: &ChatMessage, calls: &[ChatToolCall]) -> Vec<ClaudeBlock> {
    let mut blocks = Vec::with_capacity(calls.len() + 1);
    let text = msg.text();
    if !text.is_empty() {
        blocks.push(ClaudeBlock::Text { text });
    }
    blocks.extend(calls.iter().map(|call| ClaudeBlock::ToolUse {
        id: call.id.clone(),
        name: call.function.name.clone(),
        input: JsonParse::parse(&call.function.arguments).into_arguments(),
    }));
    blocks
}

pub fn block_from_claude(block: &ClaudeBlock) -> Option<ContentBlock> {
    match block {
        ClaudeBlock::Text { text } => Some(ContentBlock::Text(text.clone())),
        ClaudeBlock::Image {
            source: ImageSource::Base64 { media_type, data },
        } => match BASE64_STANDARD.decode(data) {
            Ok(bytes) => Some(ContentBlock::InlineImage {
                mime_type: media_type.clone(),
                data: bytes,
            }),
            Err(e) => {
                tracing::warn!(error = %e, "image block is not base64, skipping");
                None
            }
        },
        ClaudeBlock::Image {
            source: ImageSource::Url { url },
        } => Some(ContentBlock::ImageRef { url: url.clone() }),
        ClaudeBlock::ToolUse { .. } | ClaudeBlock::ToolResult { .. } | ClaudeBlock::Other => None,
    }
}

pub fn messages_from_turns(turns: &ClaudeTurns) -> Vec<ChatMessage> {
    let mut messages = Vec::new();
    if let Some(system) = &turns.system {
        messages.push(ChatMessage::new(Role::System, system.clone()));
    }

    for turn in &turns.messages {
        let text: String = turn
            .content
            .iter()
            .filter_map(|b| match block_from_claude(b) {
                Some(ContentBlock::Text(text)) => Some(text),
                _ => None,
            })
            .collect();

        match turn.role {
            ClaudeRole::Assistant => {
                let calls: Vec<ChatToolCall> = turn
                    .content
                    .iter()
                    .filter_map(|b| match b {
                        ClaudeBlock::ToolUse { id, name, input } => {
                            Some(ChatToolCall::new(id.clone(), name.clone(), arguments_string(Some(input))))
                        }
                        _ => None,
                    })
                    .collect();
                let mut msg = ChatMessage::new(Role::Assistant, text);
                if !calls.is_empty() {
                    msg.tool_calls = Some(calls);
                }
                messages.push(msg);
            }
            ClaudeRole::User => {
                let mut results = turn.content.iter().filter_map(|b| match b {
                    ClaudeBlock::ToolResult {
                        tool_use_id, content, ..
                    } => Some(ChatMessage::tool_result(tool_use_id.clone(), content.clone())),
                    _ => None,
                });
                match results.next() {
                    Some(first) => {
                        messages.push(first);
                        messages.extend(results);
                    }
                    None => messages.push(ChatMessage::new(Role::User, text)),
                }
            }
        }
    }

    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::openai_types::{ContentPart, ImageUrl};

    #[test]
    fn test_tool_messages_are_not_merged() {
        let mut assistant = ChatMessage::new(Role::Assistant, "checking");
        assistant.tool_calls = Some(vec![
            ChatToolCall::new("toolu_a", "f", "{\"x\":1}"),
            ChatToolCall::new("toolu_b", "g", "not json"),
        ]);
        let messages = vec![
            ChatMessage::new(Role::System, "sys one"),
            ChatMessage::new(Role::System, "sys two"),
            ChatMessage::new(Role::User, "go"),
            assistant,
            ChatMessage::tool_result("toolu_a", "1"),
            ChatMessage::tool_result("toolu_b", "2"),
        ];

        let turns = to_backend(&messages).unwrap();
        assert_eq!(turns.system.as_deref(), Some("sys one\n\nsys two"));
        assert_eq!(turns.messages.len(), 4);

        let assistant = &turns.messages[1];
        assert_eq!(assistant.role, ClaudeRole::Assistant);
        assert_eq!(
            assistant.content[0],
            ClaudeBlock::Text {
                text: "checking".to_string()
            }
        );
        assert!(matches!(
            &assistant.content[2],
            ClaudeBlock::ToolUse { input, .. } if *input == serde_json::json!({})
        ));

        for (turn, id) in turns.messages[2..].iter().zip(["toolu_a", "toolu_b"]) {
            assert_eq!(turn.role, ClaudeRole::User);
            assert_eq!(turn.content.len(), 1);
            assert!(matches!(&turn.content[0], ClaudeBlock::ToolResult { tool_use_id, .. } if tool_use_id == id));
        }
    }

    #[test]
    fn test_list_tool_content_is_joined_text() {
        let mut msg = ChatMessage::tool_result("toolu_a", "");
        msg.content = Some(ChatContent::Parts(vec![
            ContentPart::Text { text: "a".to_string() },
            ContentPart::Text { text: "b".to_string() },
        ]));
        let turns = to_backend(&[ChatMessage::new(Role::User, "go"), msg]).unwrap();
        assert!(matches!(&turns.messages[1].content[0], ClaudeBlock::ToolResult { content, .. } if content == "ab"));
    }

    #[test]
    fn test_image_sources() {
        let msg = ChatMessage {
            content: Some(ChatContent::Parts(vec![
                ContentPart::ImageUrl {
                    image_url: ImageUrl::Bare("data:image/gif;base64,R0lG".to_string()),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl::Bare("https://example.com/a.jpg".to_string()),
                },
            ])),
            ..ChatMessage::new(Role::User, "")
        };
        let turns = to_backend(&[msg]).unwrap();
        let content = &turns.messages[0].content;
        assert_eq!(
            content[0],
            ClaudeBlock::Image {
                source: ImageSource::Base64 {
                    media_type: "image/gif".to_string(),
                    data: "R0lG".to_string()
                }
            }
        );
        assert_eq!(
            content[1],
            ClaudeBlock::Image {
                source: ImageSource::Url {
                    url: "https://example.com/a.jpg".to_string()
                }
            }
        );
    }

    #[test]
    fn test_missing_tool_call_id_is_rejected() {
        let mut orphan = ChatMessage::tool_result("", "1");
        orphan.tool_call_id = Some(String::new());
        let err = to_backend(&[ChatMessage::new(Role::User, "go"), orphan]).unwrap_err();
        assert!(matches!(err, ProxyError::RequestShape { .. }));
    }

    #[test]
    fn test_text_round_trip_preserves_roles() {
        let messages = vec![
            ChatMessage::new(Role::System, "sys"),
            ChatMessage::new(Role::User, "hello"),
            ChatMessage::new(Role::Assistant, "hi there"),
            ChatMessage::new(Role::User, "bye"),
        ];
        let back = messages_from_turns(&to_backend(&messages).unwrap());
        assert_eq!(back.len(), messages.len());
        for (orig, rt) in messages.iter().zip(&back) {
            assert_eq!(orig.role, rt.role);
            assert_eq!(orig.text(), rt.text());
        }
    }
}
