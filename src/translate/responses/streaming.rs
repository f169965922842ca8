//! Re-frames a chat completion event stream as Responses API events.
//!
//! `response.created` goes first. After that every chat event maps to zero or
//! more Responses events in the same order, and the sentinel becomes
//! `response.completed` followed by `[DONE]`.

use super::response::new_response_id;
use super::types::{ResponseStatus, ResponsesStreamEvent};
use crate::translate::shared::unix_now;
use crate::translate::stream_state::ChatStreamEvent;

pub struct ResponsesStreamAdapter {
    id: String,
    created_at: i64,
    model: String,
    failed: bool,
}

impl ResponsesStreamAdapter {
    pub fn new(model: &str) -> Self {
        Self {
            id: new_response_id(),
            created_at: unix_now(),
            model: model.to_string(),
            failed: false,
        }
    }

    pub fn created(&self) -> ResponsesStreamEvent {
        ResponsesStreamEvent::Created {
            response: self.status("in_progress", None),
        }
    }

    pub fn adapt(&mut self, event: ChatStreamEvent) -> Vec<ResponsesStreamEvent> {
        match event {
            ChatStreamEvent::Chunk(chunk) => {
                let Some(delta) = chunk.choices.into_iter().next().map(|c| c.delta) else {
                    return Vec::new();
                };
                let mut out = Vec::new();
                if let Some(text) = delta.content.filter(|t| !t.is_empty()) {
                    out.push(ResponsesStreamEvent::OutputTextDelta { delta: text });
                }
                out.extend(
                    delta
                        .tool_calls
                        .into_iter()
                        .flatten()
                        .map(|tool_call| ResponsesStreamEvent::FunctionCallDelta { tool_call }),
                );
                out
            }
            ChatStreamEvent::Error(body) => {
                self.failed = true;
                vec![ResponsesStreamEvent::Error { error: body.error }]
            }
            ChatStreamEvent::Done => {
                let status = if self.failed { "failed" } else { "completed" };
                vec![
                    ResponsesStreamEvent::Completed {
                        response: self.status(status, Some(unix_now())),
                    },
                    ResponsesStreamEvent::Done,
                ]
            }
        }
    }

    fn status(&self, status: &str, completed_at: Option<i64>) -> ResponseStatus {
        ResponseStatus {
            id: self.id.clone(),
            object: "response".to_string(),
            created_at: self.created_at,
            status: status.to_string(),
            model: self.model.clone(),
            completed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::stream_state::StreamAccumulator;

    fn type_of(event: &ResponsesStreamEvent) -> String {
        if event.is_done() {
            return "[DONE]".to_string();
        }
        let json: serde_json::Value = serde_json::from_str(&event.sse_data()).unwrap();
        json["type"].as_str().unwrap().to_string()
    }

    #[test]
    fn test_event_sequence() {
        let mut acc = StreamAccumulator::new("m");
        let mut chat = Vec::new();
        chat.extend(acc.text("Hi"));
        chat.extend(acc.open_call("call_1", "lookup"));
        chat.extend(acc.call_arguments("{}"));
        chat.extend(acc.finish());

        let mut adapter = ResponsesStreamAdapter::new("m");
        let mut out = vec![adapter.created()];
        for event in chat {
            out.extend(adapter.adapt(event));
        }

        let types: Vec<String> = out.iter().map(type_of).collect();
        assert_eq!(
            types,
            vec![
                "response.created",
                "response.output_text.delta",
                "response.function_call.delta",
                "response.function_call.delta",
                "response.completed",
                "[DONE]",
            ]
        );
    }

    #[test]
    fn test_error_marks_response_failed() {
        let mut acc = StreamAccumulator::new("m");
        let mut adapter = ResponsesStreamAdapter::new("m");
        let out: Vec<_> = acc.fail("boom").into_iter().flat_map(|e| adapter.adapt(e)).collect();

        assert_eq!(out.len(), 3);
        assert_eq!(type_of(&out[0]), "error");
        match &out[1] {
            ResponsesStreamEvent::Completed { response } => assert_eq!(response.status, "failed"),
            other => panic!("Expected completed, got {other:?}"),
        }
        assert!(out[2].is_done());
    }
}
