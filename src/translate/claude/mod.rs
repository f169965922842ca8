//! Translation between the universal chat schema and the Claude Messages API.

pub mod messages;
pub mod response;
pub mod streaming;
pub mod tools;
pub mod types;

use crate::error::Result;
use crate::translate::openai_types::ChatCompletionRequest;

use tools::ToolSelection;
use types::{ClaudeRequest, OutputConfig, OutputFormat};

pub use messages::{block_from_claude, messages_from_turns, to_backend, ClaudeTurns};
pub use response::assemble;
pub use streaming::ClaudeReassembler;

pub const DEFAULT_MAX_TOKENS: u64 = 4096;

const JSON_ONLY_INSTRUCTION: &str =
    "IMPORTANT: You must respond with valid JSON only. Do not include any text outside the JSON object.";

#[derive(Debug, Clone, Copy)]
pub struct ClaudeOptions {
    /// `max_tokens` is mandatory for Claude; used when the client sends none.
    pub default_max_tokens: u64,
}

impl Default for ClaudeOptions {
    fn default() -> Self {
        Self {
            default_max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// Build the Messages body. The backend client fills in `model` or
/// `anthropic_version` depending on how it reaches Claude.
pub fn build_request(req: &ChatCompletionRequest, options: ClaudeOptions) -> Result<ClaudeRequest> {
    let turns = to_backend(&req.messages)?;
    let mut system = turns.system;

    let mut declared = req.tools.as_deref().and_then(tools::declarations);
    let declares_tools = declared.is_some();
    let mut tool_choice = None;
    if declared.is_some() {
        match tools::tool_selection(req.tool_choice.as_ref()) {
            ToolSelection::Unset => {}
            ToolSelection::DropTools => {
                tracing::debug!("tool_choice none: omitting tools from Claude request");
                declared = None;
            }
            ToolSelection::Choice(choice) => tool_choice = Some(choice),
        }
    }

    let mut output_config = None;
    // Structured output only applies to tool-free requests.
    if let (Some(format), false) = (&req.response_format, declares_tools) {
        match format.format_type.as_str() {
            "json_schema" => {
                output_config = format.schema().map(|schema| OutputConfig {
                    format: OutputFormat {
                        format_type: "json_schema".to_string(),
                        schema,
                    },
                });
            }
            "json_object" => {
                system = Some(match system {
                    Some(s) => format!("{s}\n\n{JSON_ONLY_INSTRUCTION}"),
                    None => JSON_ONLY_INSTRUCTION.to_string(),
                });
            }
            _ => {}
        }
    }

    Ok(ClaudeRequest {
        model: None,
        anthropic_version: None,
        max_tokens: req.max_tokens.unwrap_or(options.default_max_tokens),
        messages: turns.messages,
        system,
        stream: None,
        temperature: req.temperature,
        top_p: req.top_p,
        stop_sequences: req.stop.as_ref().map(|s| s.to_vec()).filter(|v| !v.is_empty()),
        tools: declared,
        tool_choice,
        output_config,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::openai_types::{
        ChatFunction, ChatMessage, ChatTool, ResponseFormat, Role, ToolChoice, ToolChoiceMode,
    };

    fn base_request() -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: "claude-sonnet-4.5".to_string(),
            messages: vec![ChatMessage::new(Role::System, "Be terse."), ChatMessage::new(Role::User, "hi")],
            ..ChatCompletionRequest::default()
        }
    }

    fn lookup_tool() -> ChatTool {
        ChatTool {
            tool_type: "function".to_string(),
            function: ChatFunction {
                name: "lookup".to_string(),
                description: None,
                parameters: None,
            },
        }
    }

    #[test]
    fn test_defaults_and_options() {
        let out = build_request(&base_request(), ClaudeOptions::default()).unwrap();
        assert_eq!(out.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(out.system.as_deref(), Some("Be terse."));
        assert!(out.tools.is_none());

        let req = ChatCompletionRequest {
            max_tokens: Some(50),
            ..base_request()
        };
        assert_eq!(build_request(&req, ClaudeOptions::default()).unwrap().max_tokens, 50);
    }

    #[test]
    fn test_tool_choice_none_drops_tools() {
        let req = ChatCompletionRequest {
            tools: Some(vec![lookup_tool()]),
            tool_choice: Some(ToolChoice::Mode(ToolChoiceMode::None)),
            ..base_request()
        };
        let out = build_request(&req, ClaudeOptions::default()).unwrap();
        assert!(out.tools.is_none());
        assert!(out.tool_choice.is_none());
    }

    #[test]
    fn test_json_object_appends_instruction() {
        let req = ChatCompletionRequest {
            response_format: Some(ResponseFormat {
                format_type: "json_object".to_string(),
                json_schema: None,
            }),
            ..base_request()
        };
        let out = build_request(&req, ClaudeOptions::default()).unwrap();
        let system = out.system.unwrap();
        assert!(system.starts_with("Be terse.\n\n"));
        assert!(system.ends_with(JSON_ONLY_INSTRUCTION));
    }

    #[test]
    fn test_json_schema_ignored_with_tools() {
        let format = ResponseFormat {
            format_type: "json_schema".to_string(),
            json_schema: Some(serde_json::json!({"schema": {"type": "object"}})),
        };
        let req = ChatCompletionRequest {
            response_format: Some(format.clone()),
            ..base_request()
        };
        let out = build_request(&req, ClaudeOptions::default()).unwrap();
        assert_eq!(out.output_config.unwrap().format.schema, serde_json::json!({"type": "object"}));

        let req = ChatCompletionRequest {
            response_format: Some(format),
            tools: Some(vec![lookup_tool()]),
            ..base_request()
        };
        let out = build_request(&req, ClaudeOptions::default()).unwrap();
        assert!(out.output_config.is_none());
        assert_eq!(out.tools.unwrap().len(), 1);
    }

    #[test]
    fn test_json_schema_kept_with_empty_tool_list() {
        let req = ChatCompletionRequest {
            response_format: Some(ResponseFormat {
                format_type: "json_schema".to_string(),
                json_schema: Some(serde_json::json!({"schema": {"type": "object"}})),
            }),
            tools: Some(vec![]),
            ..base_request()
        };
        let out = build_request(&req, ClaudeOptions::default()).unwrap();
        assert!(out.tools.is_none());
        assert_eq!(out.output_config.unwrap().format.schema, serde_json::json!({"type": "object"}));
    }
}
