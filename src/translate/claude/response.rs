use super::tools::tool_call_from_claude;
use super::types::{ClaudeBlock, ClaudeResponse};
use crate::translate::openai_types::{ChatCompletionResponse, ChatUsage, Choice, ChoiceMessage};
use crate::translate::shared::{estimate_tokens, finish_reason, new_completion_id, unix_now};

/// Assemble a completed Messages response.
pub fn assemble(resp: &ClaudeResponse, model: &str, prompt_chars: usize) -> ChatCompletionResponse {
    let mut text = String::new();
    let mut tool_calls = Vec::new();

    for block in &resp.content {
        match block {
            ClaudeBlock::Text { text: t } => text.push_str(t),
            ClaudeBlock::ToolUse { id, name, input } => tool_calls.push(tool_call_from_claude(id, name, input)),
            ClaudeBlock::Image { .. } | ClaudeBlock::ToolResult { .. } | ClaudeBlock::Other => {}
        }
    }

    let usage = match resp.usage {
        Some(u) => ChatUsage::new(u.input_tokens, u.output_tokens),
        None => {
            tracing::debug!("no usage from backend, token counts are estimated");
            ChatUsage::new(estimate_tokens(prompt_chars), estimate_tokens(text.chars().count()))
        }
    };

    ChatCompletionResponse {
        id: new_completion_id(),
        object: "chat.completion".to_string(),
        created: unix_now(),
        model: model.to_string(),
        choices: vec![Choice {
            index: 0,
            finish_reason: Some(finish_reason(!tool_calls.is_empty(), resp.is_truncated())),
            message: ChoiceMessage {
                role: "assistant".to_string(),
                content: (!text.is_empty()).then_some(text),
                tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
            },
        }],
        usage: Some(usage),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::openai_types::FinishReason;

    #[test]
    fn test_text_and_tool_use() {
        let resp: ClaudeResponse = serde_json::from_str(
            r#"{"id":"msg_1","model":"claude-sonnet-4-5","stop_reason":"tool_use",
                "content":[{"type":"text","text":"Let me check."},
                           {"type":"tool_use","id":"toolu_9","name":"lookup","input":{"q":"x"}}],
                "usage":{"input_tokens":12,"output_tokens":7}}"#,
        )
        .unwrap();
        let out = assemble(&resp, "claude-sonnet-4.5", 0);
        let msg = out.message().unwrap();
        assert_eq!(msg.content.as_deref(), Some("Let me check."));
        let calls = msg.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].id, "toolu_9");
        assert_eq!(calls[0].function.arguments, "{\"q\":\"x\"}");
        assert_eq!(out.finish_reason(), Some(FinishReason::ToolCalls));
        assert_eq!(out.usage, Some(ChatUsage::new(12, 7)));
    }

    #[test]
    fn test_max_tokens_is_length() {
        let resp: ClaudeResponse = serde_json::from_str(
            r#"{"content":[{"type":"text","text":"abcd"}],"stop_reason":"max_tokens"}"#,
        )
        .unwrap();
        let out = assemble(&resp, "m", 8);
        assert_eq!(out.finish_reason(), Some(FinishReason::Length));
        assert_eq!(out.usage, Some(ChatUsage::new(2, 1)));
    }

    #[test]
    fn test_empty_content_is_null() {
        let out = assemble(&ClaudeResponse::default(), "m", 0);
        assert!(out.message().unwrap().content.is_none());
        assert_eq!(out.finish_reason(), Some(FinishReason::Stop));
    }
}
