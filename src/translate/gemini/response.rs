//! Completed `generateContent` response to a chat completion.

use super::tools::tool_call_from_gemini;
use super::types::{GeminiResponse, PartKind};
use crate::signature::CapturedSignature;
use crate::translate::openai_types::{ChatCompletionResponse, ChatUsage, Choice, ChoiceMessage};
use crate::translate::shared::{estimate_tokens, finish_reason, new_completion_id, unix_now};

/// The assembled result plus every continuation token the response carried.
#[derive(Debug, Clone)]
pub struct GeminiAssembly {
    pub response: ChatCompletionResponse,
    pub signatures: Vec<CapturedSignature>,
}

/// Assemble one response. `prompt_chars` feeds the usage estimate when the
/// backend reports no counts.
pub fn assemble(resp: &GeminiResponse, model: &str, prompt_chars: usize) -> GeminiAssembly {
    let mut text = String::new();
    let mut tool_calls = Vec::new();
    let mut signatures = Vec::new();

    for part in resp.parts() {
        match part.kind() {
            PartKind::Text { text: t, thought: false } => text.push_str(&t),
            PartKind::FunctionCall { call, signature } => {
                let tool_call = tool_call_from_gemini(&call);
                if let Some(signature) = signature {
                    signatures.push(CapturedSignature {
                        call_id: tool_call.id.clone(),
                        signature,
                    });
                }
                tool_calls.push(tool_call);
            }
            PartKind::Text { thought: true, .. }
            | PartKind::InlineData(_)
            | PartKind::FileData(_)
            | PartKind::FunctionResponse(_)
            | PartKind::Empty => {}
        }
    }

    let usage = match resp.usage_metadata {
        Some(meta) => ChatUsage::new(meta.prompt_token_count, meta.candidates_token_count),
        None => {
            let completion_chars = text.chars().count()
                + tool_calls
                    .iter()
                    .map(|c| c.function.name.len() + c.function.arguments.len())
                    .sum::<usize>();
            let usage = ChatUsage::new(estimate_tokens(prompt_chars), estimate_tokens(completion_chars));
            tracing::debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "no usageMetadata from backend, token counts are estimated"
            );
            usage
        }
    };

    let reason = finish_reason(!tool_calls.is_empty(), resp.is_truncated());

    let response = ChatCompletionResponse {
        id: new_completion_id(),
        object: "chat.completion".to_string(),
        created: unix_now(),
        model: model.to_string(),
        choices: vec![Choice {
            index: 0,
            message: ChoiceMessage {
                role: "assistant".to_string(),
                content: (!text.is_empty()).then_some(text),
                tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
            },
            finish_reason: Some(reason),
        }],
        usage: Some(usage),
    };

    GeminiAssembly { response, signatures }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::openai_types::FinishReason;

    fn response(json: &str) -> GeminiResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_plain_text_stops() {
        let resp = response(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hel"},{"text":"lo"}]},"finishReason":"STOP"}],
                "usageMetadata":{"promptTokenCount":3,"candidatesTokenCount":2,"totalTokenCount":5}}"#,
        );
        let out = assemble(&resp, "gemini-2.5-pro", 0);
        let msg = out.response.message().unwrap();
        assert_eq!(msg.content.as_deref(), Some("Hello"));
        assert!(msg.tool_calls.is_none());
        assert_eq!(out.response.finish_reason(), Some(FinishReason::Stop));
        assert_eq!(out.response.usage, Some(ChatUsage::new(3, 2)));
        assert!(out.signatures.is_empty());
    }

    #[test]
    fn test_function_call_captures_signature() {
        let resp = response(
            r#"{"candidates":[{"content":{"role":"model","parts":[
                {"text":"pondering","thought":true},
                {"functionCall":{"name":"lookup","args":{"q":"x"}},"thoughtSignature":"c2ln"}
            ]},"finishReason":"MAX_TOKENS"}]}"#,
        );
        let out = assemble(&resp, "gemini-2.5-pro", 40);
        let msg = out.response.message().unwrap();
        assert!(msg.content.is_none());
        let calls = msg.tool_calls.as_ref().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.arguments, "{\"q\":\"x\"}");

        // tool calls win over truncation
        assert_eq!(out.response.finish_reason(), Some(FinishReason::ToolCalls));

        assert_eq!(out.signatures.len(), 1);
        assert_eq!(out.signatures[0].call_id, calls[0].id);
        assert_eq!(out.signatures[0].signature, b"sig".to_vec());

        let usage = out.response.usage.unwrap();
        assert_eq!(usage.prompt_tokens, 10);
        assert!(usage.completion_tokens > 0);
    }

    #[test]
    fn test_truncation_without_calls_is_length() {
        let resp = response(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"cut"}]},"finishReason":"MAX_TOKENS"}]}"#,
        );
        let out = assemble(&resp, "m", 0);
        assert_eq!(out.response.finish_reason(), Some(FinishReason::Length));
    }

    #[test]
    fn test_blocked_candidate_yields_null_content() {
        let resp = response(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#);
        let out = assemble(&resp, "m", 0);
        assert!(out.response.message().unwrap().content.is_none());
        assert_eq!(out.response.finish_reason(), Some(FinishReason::Stop));
    }
}
