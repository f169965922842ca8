use super::types::{OutputContent, ResponseObject, ResponseOutputItem, ResponseUsage, ResponsesRequest};
use crate::translate::openai_types::{ChatCompletionResponse, ToolChoice};
use crate::translate::shared::unix_now;

pub fn new_response_id() -> String {
    format!("resp_{}", uuid::Uuid::new_v4().simple())
}

fn new_message_id() -> String {
    format!("msg_{}", uuid::Uuid::new_v4().simple())
}

/// Wrap a chat completion in the Responses envelope, echoing request settings.
pub fn from_chat_response(chat: &ChatCompletionResponse, req: &ResponsesRequest) -> ResponseObject {
    let mut output = Vec::new();

    if let Some(message) = chat.message() {
        if let Some(text) = message.content.as_deref().filter(|t| !t.is_empty()) {
            output.push(ResponseOutputItem::Message {
                id: new_message_id(),
                status: "completed".to_string(),
                role: "assistant".to_string(),
                content: vec![OutputContent::OutputText {
                    text: text.to_string(),
                    annotations: Vec::new(),
                }],
            });
        }
        for call in message.tool_calls.iter().flatten() {
            output.push(ResponseOutputItem::FunctionCall {
                id: call.id.clone(),
                call_id: call.id.clone(),
                name: call.function.name.clone(),
                arguments: call.function.arguments.clone(),
                status: "completed".to_string(),
            });
        }
    }

    if output.is_empty() {
        output.push(ResponseOutputItem::Message {
            id: new_message_id(),
            status: "completed".to_string(),
            role: "assistant".to_string(),
            content: Vec::new(),
        });
    }

    let usage = chat.usage.map(|u| ResponseUsage {
        input_tokens: u.prompt_tokens,
        output_tokens: u.completion_tokens,
        total_tokens: u.total_tokens,
    });

    let tool_choice = match &req.tool_choice {
        Some(ToolChoice::Mode(mode)) => serde_json::to_value(mode).unwrap_or_else(|_| "auto".into()),
        _ => serde_json::Value::from("auto"),
    };

    ResponseObject {
        id: new_response_id(),
        object: "response".to_string(),
        created_at: chat.created,
        completed_at: Some(unix_now()),
        status: "completed".to_string(),
        model: chat.model.clone(),
        output,
        usage,
        instructions: req.instructions.clone(),
        max_output_tokens: req.max_output_tokens,
        temperature: req.temperature.unwrap_or(1.0),
        top_p: req.top_p.unwrap_or(1.0),
        tool_choice,
        tools: req.tools.clone().unwrap_or_default(),
        parallel_tool_calls: req.parallel_tool_calls.unwrap_or(true),
        truncation: req.truncation.clone().unwrap_or_else(|| "disabled".to_string()),
        user: req.user.clone(),
        metadata: req
            .metadata
            .clone()
            .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new())),
    }
}
