//! Claude Messages stream events to chat completion chunks.
//!
//! Claude streams tool arguments as `input_json_delta` fragments; they are
//! forwarded one-for-one without joining or validating.

use super::types::{ClaudeBlock, ClaudeDelta, ClaudeStreamEvent};
use crate::translate::stream_state::{ChatStreamEvent, Reassembler, StreamAccumulator};

pub struct ClaudeReassembler {
    acc: StreamAccumulator,
}

impl ClaudeReassembler {
    pub fn new(model: &str) -> Self {
        Self {
            acc: StreamAccumulator::new(model),
        }
    }
}

impl Reassembler for ClaudeReassembler {
    type Event = ClaudeStreamEvent;

    fn process(&mut self, event: ClaudeStreamEvent) -> Vec<ChatStreamEvent> {
        match event {
            ClaudeStreamEvent::ContentBlockStart {
                content_block: ClaudeBlock::ToolUse { id, name, .. },
                ..
            } => self.acc.open_call(&id, &name).into_iter().collect(),
            ClaudeStreamEvent::ContentBlockStart {
                content_block: ClaudeBlock::Text { text },
                ..
            } => self.acc.text(&text).into_iter().collect(),
            ClaudeStreamEvent::ContentBlockDelta { delta, .. } => match delta {
                ClaudeDelta::TextDelta { text } => self.acc.text(&text).into_iter().collect(),
                ClaudeDelta::InputJsonDelta { partial_json } => {
                    self.acc.call_arguments(&partial_json).into_iter().collect()
                }
                ClaudeDelta::Other => Vec::new(),
            },
            ClaudeStreamEvent::ContentBlockStop { .. } => {
                self.acc.close_call();
                Vec::new()
            }
            ClaudeStreamEvent::MessageDelta { delta, .. } => {
                if delta.stop_reason.as_deref() == Some("max_tokens") {
                    self.acc.mark_truncated();
                }
                Vec::new()
            }
            ClaudeStreamEvent::MessageStop => self.acc.finish(),
            ClaudeStreamEvent::Error { error } => {
                tracing::warn!(error_type = %error.error_type, message = %error.message, "error event in Claude stream");
                self.acc.fail(&error.message)
            }
            ClaudeStreamEvent::MessageStart { .. }
            | ClaudeStreamEvent::ContentBlockStart { .. }
            | ClaudeStreamEvent::Ping
            | ClaudeStreamEvent::Unknown => Vec::new(),
        }
    }

    fn finish(&mut self) -> Vec<ChatStreamEvent> {
        self.acc.finish()
    }

    fn fail(&mut self, message: &str) -> Vec<ChatStreamEvent> {
        self.acc.fail(message)
    }

    fn accumulator(&self) -> &StreamAccumulator {
        &self.acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::openai_types::{ChunkDelta, FinishReason};

    fn event(json: &str) -> ClaudeStreamEvent {
        serde_json::from_str(json).unwrap()
    }

    fn delta_of(e: &ChatStreamEvent) -> ChunkDelta {
        match e {
            ChatStreamEvent::Chunk(c) => c.delta().unwrap().clone(),
            other => panic!("Expected chunk, got {other:?}"),
        }
    }

    fn run(events: &[&str]) -> (ClaudeReassembler, Vec<ChatStreamEvent>) {
        let mut r = ClaudeReassembler::new("claude-sonnet-4.5");
        let mut out = Vec::new();
        for e in events {
            out.extend(r.process(event(e)));
        }
        (r, out)
    }

    #[test]
    fn test_text_and_tool_fragments_in_order() {
        let (_, out) = run(&[
            r#"{"type":"message_start","message":{"id":"msg_1","content":[],"usage":{"input_tokens":5,"output_tokens":0}}}"#,
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#,
            r#"{"type":"content_block_stop","index":0}"#,
            r#"{"type":"content_block_start","index":1,"content_block":{"type":"tool_use","id":"toolu_1","name":"lookup","input":{}}}"#,
            r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":""}}"#,
            r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{\"q\":"}}"#,
            r#"{"type":"ping"}"#,
            r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"\"x\"}"}}"#,
            r#"{"type":"content_block_stop","index":1}"#,
            r#"{"type":"message_delta","delta":{"stop_reason":"tool_use"},"usage":{"output_tokens":9}}"#,
            r#"{"type":"message_stop"}"#,
        ]);

        assert_eq!(out.len(), 6);
        assert_eq!(delta_of(&out[0]).content.as_deref(), Some("Hi"));

        let open = &delta_of(&out[1]).tool_calls.unwrap()[0];
        assert_eq!(open.index, 0);
        assert_eq!(open.id.as_deref(), Some("toolu_1"));
        assert_eq!(open.function.name.as_deref(), Some("lookup"));
        assert_eq!(open.function.arguments, "");

        assert_eq!(delta_of(&out[2]).tool_calls.unwrap()[0].function.arguments, "{\"q\":");
        assert_eq!(delta_of(&out[3]).tool_calls.unwrap()[0].function.arguments, "\"x\"}");

        match &out[4] {
            ChatStreamEvent::Chunk(c) => assert_eq!(c.choices[0].finish_reason, Some(FinishReason::ToolCalls)),
            other => panic!("Expected terminal chunk, got {other:?}"),
        }
        assert!(out[5].is_done());
    }

    #[test]
    fn test_max_tokens_then_stop_is_length() {
        let (r, out) = run(&[
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"partial"}}"#,
            r#"{"type":"message_delta","delta":{"stop_reason":"max_tokens"}}"#,
            r#"{"type":"message_stop"}"#,
        ]);
        assert_eq!(out.len(), 3);
        assert_eq!(r.accumulator().finish_reason(), Some(FinishReason::Length));
    }

    #[test]
    fn test_error_event_ends_stream() {
        let (mut r, out) = run(&[
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"par"}}"#,
            r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
            r#"{"type":"message_stop"}"#,
        ]);
        assert_eq!(out.len(), 3);
        assert!(matches!(&out[1], ChatStreamEvent::Error(e) if e.error.message == "Overloaded"));
        assert!(out[2].is_done());
        assert!(r.finish().is_empty());
    }
}
