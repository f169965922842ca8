use super::types::{ClaudeTool, ClaudeToolChoice};
use crate::translate::openai_types::{ChatTool, ChatToolCall, ToolChoice, ToolChoiceMode};
use crate::translate::shared::arguments_string;

/// How a universal tool-choice selector lands in a Claude request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolSelection {
    /// Leave `tool_choice` out.
    Unset,
    /// Claude has no "none" mode, so the tools are not sent at all.
    DropTools,
    Choice(ClaudeToolChoice),
}

pub fn declarations(tools: &[ChatTool]) -> Option<Vec<ClaudeTool>> {
    let out: Vec<ClaudeTool> = tools
        .iter()
        .filter(|t| t.tool_type == "function")
        .map(|t| ClaudeTool {
            name: t.function.name.clone(),
            description: t.function.description.clone(),
            input_schema: t
                .function
                .parameters
                .clone()
                .unwrap_or_else(|| serde_json::json!({"type": "object", "properties": {}})),
        })
        .collect();
    (!out.is_empty()).then_some(out)
}

pub fn tool_selection(choice: Option<&ToolChoice>) -> ToolSelection {
    let Some(choice) = choice else {
        return ToolSelection::Unset;
    };
    match choice {
        ToolChoice::Mode(ToolChoiceMode::None) => ToolSelection::DropTools,
        ToolChoice::Mode(ToolChoiceMode::Auto) => ToolSelection::Choice(ClaudeToolChoice::Auto),
        ToolChoice::Mode(ToolChoiceMode::Required) => ToolSelection::Choice(ClaudeToolChoice::Any),
        ToolChoice::Function(_) => match choice.forced_name() {
            Some(name) => ToolSelection::Choice(ClaudeToolChoice::Tool {
                name: name.to_string(),
            }),
            None => ToolSelection::Unset,
        },
    }
}

/// Claude always supplies the id; it is passed through verbatim.
pub fn tool_call_from_claude(id: &str, name: &str, input: &serde_json::Value) -> ChatToolCall {
    ChatToolCall::new(id, name, arguments_string(Some(input)))
}
