use super::types::{ResponseInputItem, ResponsesInput, ResponsesRequest, TextFormat};
use crate::translate::openai_types::{
    ChatCompletionRequest, ChatContent, ChatMessage, ChatToolCall, ResponseFormat, Role,
};

/// Rewrite a Responses request as a chat completion request.
pub fn to_chat_request(req: &ResponsesRequest) -> ChatCompletionRequest {
    let mut messages = Vec::new();

    if let Some(instructions) = req.instructions.as_deref().filter(|s| !s.is_empty()) {
        messages.push(ChatMessage::new(Role::System, instructions));
    }

    match &req.input {
        ResponsesInput::Text(text) => messages.push(ChatMessage::new(Role::User, text.clone())),
        ResponsesInput::Items(items) => {
            for item in items {
                push_item(&mut messages, item);
            }
        }
    }

    let tools = req
        .tools
        .as_ref()
        .map(|tools| tools.iter().filter_map(|t| t.to_chat_tool()).collect::<Vec<_>>())
        .filter(|tools| !tools.is_empty());

    ChatCompletionRequest {
        model: req.model.clone(),
        messages,
        temperature: req.temperature,
        top_p: req.top_p,
        max_tokens: req.max_output_tokens,
        stream: req.stream,
        user: req.user.clone(),
        tools,
        tool_choice: req.tool_choice.clone(),
        response_format: req
            .text
            .as_ref()
            .and_then(|t| t.format.as_ref())
            .and_then(response_format),
        ..ChatCompletionRequest::default()
    }
}

/// Append one input item. Consecutive `function_call` items, and any assistant
/// message just before them, collapse into a single assistant turn so parallel
/// calls replay as one model turn.
fn push_item(messages: &mut Vec<ChatMessage>, item: &ResponseInputItem) {
    if item.item_type.as_deref() != Some("function_call") {
        messages.push(item_to_message(item));
        return;
    }

    let call = ChatToolCall::new(
        item.call_id.clone().unwrap_or_default(),
        item.name.clone().unwrap_or_default(),
        item.arguments.clone().unwrap_or_else(|| "{}".to_string()),
    );
    match messages.last_mut() {
        Some(last) if last.role == Role::Assistant => {
            last.tool_calls.get_or_insert_with(Vec::new).push(call);
        }
        _ => messages.push(ChatMessage {
            content: None,
            tool_calls: Some(vec![call]),
            ..ChatMessage::new(Role::Assistant, "")
        }),
    }
}

fn item_to_message(item: &ResponseInputItem) -> ChatMessage {
    match item.item_type.as_deref() {
        Some("function_call_output") => {
            let output = match &item.output {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => String::new(),
            };
            ChatMessage::tool_result(
                item.call_id.clone().or_else(|| item.tool_call_id.clone()).unwrap_or_default(),
                output,
            )
        }
        _ => ChatMessage {
            role: item.role.unwrap_or(Role::User),
            content: item.content.clone().or(Some(ChatContent::Text(String::new()))),
            name: item.name.clone(),
            tool_calls: item.tool_calls.clone(),
            tool_call_id: item.tool_call_id.clone(),
            thought_signature: None,
        },
    }
}

fn response_format(format: &TextFormat) -> Option<ResponseFormat> {
    match format.format_type.as_str() {
        "json_schema" => {
            let json_schema = format.json_schema.clone().or_else(|| {
                format.schema.as_ref().map(|schema| {
                    serde_json::json!({
                        "name": format.name.clone().unwrap_or_else(|| "response".to_string()),
                        "schema": schema,
                    })
                })
            });
            Some(ResponseFormat {
                format_type: "json_schema".to_string(),
                json_schema,
            })
        }
        "json_object" => Some(ResponseFormat {
            format_type: "json_object".to_string(),
            json_schema: None,
        }),
        _ => None,
    }
}
