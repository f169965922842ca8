//! Translation between the universal chat schema and Gemini `generateContent`.

pub mod messages;
pub mod response;
pub mod streaming;
pub mod tools;
pub mod types;

use std::collections::HashMap;

use crate::error::Result;
use crate::translate::openai_types::ChatCompletionRequest;

use types::{safety_off, GeminiRequest, GenerationConfig};

pub use messages::{block_from_gemini, messages_from_turns, to_backend, GeminiTurns};
pub use response::{assemble, GeminiAssembly};
pub use streaming::GeminiReassembler;

#[derive(Debug, Clone, Copy)]
pub struct GeminiOptions {
    /// Send every harm category at threshold `OFF`.
    pub safety_off: bool,
}

impl Default for GeminiOptions {
    fn default() -> Self {
        Self { safety_off: true }
    }
}

/// Ids of every tool call replayed in assistant turns, for signature lookup.
pub fn replayed_call_ids(req: &ChatCompletionRequest) -> Vec<String> {
    req.messages
        .iter()
        .filter_map(|m| m.tool_calls.as_ref())
        .flatten()
        .map(|c| c.id.clone())
        .collect()
}

/// Build the full `generateContent` body.
pub fn build_request(
    req: &ChatCompletionRequest,
    signatures: &HashMap<String, Vec<u8>>,
    options: GeminiOptions,
) -> Result<GeminiRequest> {
    let turns = to_backend(&req.messages, signatures)?;

    let mut config = GenerationConfig {
        temperature: req.temperature,
        top_p: req.top_p,
        max_output_tokens: req.max_tokens,
        stop_sequences: req.stop.as_ref().map(|s| s.to_vec()).filter(|v| !v.is_empty()),
        presence_penalty: req.presence_penalty,
        frequency_penalty: req.frequency_penalty,
        ..GenerationConfig::default()
    };

    if let Some(format) = &req.response_format {
        match format.format_type.as_str() {
            "json_schema" => {
                config.response_mime_type = Some("application/json".to_string());
                config.response_json_schema = format.schema();
            }
            "json_object" => config.response_mime_type = Some("application/json".to_string()),
            _ => {}
        }
    }

    let declarations = req.tools.as_deref().and_then(tools::declarations);
    let tool_config = if declarations.is_some() {
        tools::tool_config(req.tool_choice.as_ref())
    } else {
        None
    };

    Ok(GeminiRequest {
        contents: turns.contents,
        system_instruction: turns.system_instruction,
        generation_config: Some(config),
        tools: declarations,
        tool_config,
        safety_settings: options.safety_off.then(safety_off),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::openai_types::{
        ChatFunction, ChatMessage, ChatTool, ChatToolCall, ResponseFormat, Role, StopSequences, ToolChoice,
    };

    #[test]
    fn test_generation_options_map() {
        let req = ChatCompletionRequest {
            model: "gemini-2.5-pro".to_string(),
            messages: vec![ChatMessage::new(Role::User, "hi")],
            temperature: Some(0.2),
            max_tokens: Some(256),
            stop: Some(StopSequences::One("END".to_string())),
            response_format: Some(ResponseFormat {
                format_type: "json_schema".to_string(),
                json_schema: Some(serde_json::json!({"name": "out", "schema": {"type": "object"}})),
            }),
            ..ChatCompletionRequest::default()
        };
        let out = build_request(&req, &HashMap::new(), GeminiOptions::default()).unwrap();
        let json = serde_json::to_value(&out).unwrap();

        assert_eq!(json["generationConfig"]["temperature"], 0.2);
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 256);
        assert_eq!(json["generationConfig"]["stopSequences"][0], "END");
        assert_eq!(json["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(json["generationConfig"]["responseJsonSchema"]["type"], "object");
        assert_eq!(json["safetySettings"].as_array().unwrap().len(), 4);
        assert!(json.get("tools").is_none());
    }

    #[test]
    fn test_tools_and_choice_map() {
        let req = ChatCompletionRequest {
            model: "gemini-2.5-pro".to_string(),
            messages: vec![ChatMessage::new(Role::User, "hi")],
            tools: Some(vec![ChatTool {
                tool_type: "function".to_string(),
                function: ChatFunction {
                    name: "lookup".to_string(),
                    description: None,
                    parameters: Some(serde_json::json!({"type": "object"})),
                },
            }]),
            tool_choice: Some(ToolChoice::forced("lookup")),
            ..ChatCompletionRequest::default()
        };
        let out = build_request(&req, &HashMap::new(), GeminiOptions { safety_off: false }).unwrap();
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["tools"][0]["functionDeclarations"][0]["name"], "lookup");
        assert_eq!(json["toolConfig"]["functionCallingConfig"]["mode"], "ANY");
        assert!(json.get("safetySettings").is_none());
    }

    #[test]
    fn test_replayed_call_ids() {
        let mut assistant = ChatMessage::new(Role::Assistant, "");
        assistant.tool_calls = Some(vec![
            ChatToolCall::new("a", "f", "{}"),
            ChatToolCall::new("b", "g", "{}"),
        ]);
        let req = ChatCompletionRequest {
            messages: vec![ChatMessage::new(Role::User, "go"), assistant],
            ..ChatCompletionRequest::default()
        };
        assert_eq!(replayed_call_ids(&req), vec!["a".to_string(), "b".to_string()]);
    }
}
