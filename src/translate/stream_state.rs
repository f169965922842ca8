//! State machine shared by both stream reassemblers.
//!
//! The [`StreamAccumulator`] turns backend-neutral steps (a text fragment, a tool
//! call opening, an argument fragment, a tool call closing, end of stream, failure)
//! into OpenAI `chat.completion.chunk` events. Each backend's reassembler decodes
//! its own event stream and drives one accumulator per request.
//!
//! Usage:
//!   let mut acc = StreamAccumulator::new("gemini-2.5-pro");
//!   let hi = acc.text("Hi");
//!   let open = acc.open_call("call_1", "lookup");
//!   let args = acc.call_arguments("{\"q\":");
//!   acc.close_call();
//!   let tail = acc.finish(); // terminal delta + [DONE]

use super::openai_types::{
    ChatCompletionChunk, ChatError, ChatErrorResponse, ChunkChoice, ChunkDelta, ChunkToolCall,
    ChunkToolCallFunction, FinishReason,
};
use super::shared::{finish_reason, new_completion_id, unix_now};
use crate::signature::CapturedSignature;

/// One outbound event of a streamed chat completion.
#[derive(Debug, Clone)]
pub enum ChatStreamEvent {
    Chunk(ChatCompletionChunk),
    Error(ChatErrorResponse),
    /// The `[DONE]` sentinel.
    Done,
}

impl ChatStreamEvent {
    /// Payload of the `data:` line for this event.
    pub fn sse_data(&self) -> String {
        match self {
            ChatStreamEvent::Chunk(chunk) => serde_json::to_string(chunk).unwrap_or_default(),
            ChatStreamEvent::Error(err) => serde_json::to_string(err).unwrap_or_default(),
            ChatStreamEvent::Done => "[DONE]".to_string(),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, ChatStreamEvent::Done)
    }
}

/// Per-request translator from one backend's stream events to [`ChatStreamEvent`]s.
///
/// The proxy drives it: `process` for every decoded backend event, then exactly
/// one of `finish` (transport ended) or `fail` (transport error).
pub trait Reassembler: Send {
    type Event: Send;

    fn process(&mut self, event: Self::Event) -> Vec<ChatStreamEvent>;

    fn finish(&mut self) -> Vec<ChatStreamEvent>;

    fn fail(&mut self, message: &str) -> Vec<ChatStreamEvent>;

    fn accumulator(&self) -> &StreamAccumulator;

    /// Continuation tokens seen since the last call; persisted before the
    /// matching events go out.
    fn take_signatures(&mut self) -> Vec<CapturedSignature> {
        Vec::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    TextRun,
    ToolCallRun { index: usize },
    Done,
}

#[derive(Debug, Clone)]
pub struct ToolCallSlot {
    pub id: String,
    pub name: String,
    pub open: bool,
}

#[derive(Debug)]
pub struct StreamAccumulator {
    id: String,
    created: i64,
    model: String,
    state: StreamState,
    text_chars: usize,
    slots: Vec<ToolCallSlot>,
    truncated: bool,
    finish_reason: Option<FinishReason>,
}

impl StreamAccumulator {
    pub fn new(model: &str) -> Self {
        Self {
            id: new_completion_id(),
            created: unix_now(),
            model: model.to_string(),
            state: StreamState::Idle,
            text_chars: 0,
            slots: Vec::new(),
            truncated: false,
            finish_reason: None,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn slots(&self) -> &[ToolCallSlot] {
        &self.slots
    }

    pub fn text_chars(&self) -> usize {
        self.text_chars
    }

    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.finish_reason
    }

    pub fn is_done(&self) -> bool {
        self.state == StreamState::Done
    }

    /// Record a backend truncation signal; it only matters if no tool call shows up.
    pub fn mark_truncated(&mut self) {
        self.truncated = true;
    }

    /// Forward a text fragment as one content delta. Empty fragments produce nothing.
    pub fn text(&mut self, fragment: &str) -> Option<ChatStreamEvent> {
        if self.is_done() || fragment.is_empty() {
            return None;
        }
        if let StreamState::ToolCallRun { .. } = self.state {
            self.close_call();
        }
        self.state = StreamState::TextRun;
        self.text_chars += fragment.chars().count();

        Some(self.chunk(
            ChunkDelta {
                content: Some(fragment.to_string()),
                ..ChunkDelta::default()
            },
            None,
        ))
    }

    /// Open the next tool-call slot and announce its id and name with empty arguments.
    pub fn open_call(&mut self, id: &str, name: &str) -> Option<ChatStreamEvent> {
        if self.is_done() {
            return None;
        }
        if let StreamState::ToolCallRun { .. } = self.state {
            self.close_call();
        }

        let index = self.slots.len();
        self.slots.push(ToolCallSlot {
            id: id.to_string(),
            name: name.to_string(),
            open: true,
        });
        self.state = StreamState::ToolCallRun { index };

        Some(self.chunk(
            ChunkDelta {
                tool_calls: Some(vec![ChunkToolCall {
                    index,
                    id: Some(id.to_string()),
                    call_type: Some("function".to_string()),
                    function: ChunkToolCallFunction {
                        name: Some(name.to_string()),
                        arguments: String::new(),
                    },
                }]),
                ..ChunkDelta::default()
            },
            None,
        ))
    }

    /// Forward an argument fragment for the open slot, verbatim.
    pub fn call_arguments(&mut self, fragment: &str) -> Option<ChatStreamEvent> {
        let StreamState::ToolCallRun { index } = self.state else {
            tracing::debug!("argument fragment with no open tool call, dropping");
            return None;
        };
        if fragment.is_empty() {
            return None;
        }

        Some(self.chunk(
            ChunkDelta {
                tool_calls: Some(vec![ChunkToolCall {
                    index,
                    id: None,
                    call_type: None,
                    function: ChunkToolCallFunction {
                        name: None,
                        arguments: fragment.to_string(),
                    },
                }]),
                ..ChunkDelta::default()
            },
            None,
        ))
    }

    pub fn close_call(&mut self) {
        if let StreamState::ToolCallRun { index } = self.state {
            if let Some(slot) = self.slots.get_mut(index) {
                slot.open = false;
            }
            self.state = StreamState::Idle;
        }
    }

    /// Terminal delta carrying the finish reason, then the sentinel. Only the first call emits.
    pub fn finish(&mut self) -> Vec<ChatStreamEvent> {
        if self.is_done() {
            return Vec::new();
        }
        self.close_call();

        let reason = finish_reason(!self.slots.is_empty(), self.truncated);
        self.finish_reason = Some(reason);
        let terminal = self.chunk(ChunkDelta::default(), Some(reason));
        self.state = StreamState::Done;

        vec![terminal, ChatStreamEvent::Done]
    }

    /// One error event, then the sentinel. Only emits if the stream has not ended.
    pub fn fail(&mut self, message: &str) -> Vec<ChatStreamEvent> {
        if self.is_done() {
            return Vec::new();
        }
        self.state = StreamState::Done;

        vec![
            ChatStreamEvent::Error(ChatErrorResponse {
                error: ChatError {
                    message: message.to_string(),
                    error_type: "api_error".to_string(),
                    code: None,
                },
            }),
            ChatStreamEvent::Done,
        ]
    }

    fn chunk(&self, delta: ChunkDelta, finish_reason: Option<FinishReason>) -> ChatStreamEvent {
        ChatStreamEvent::Chunk(ChatCompletionChunk {
            id: self.id.clone(),
            object: "chat.completion.chunk".to_string(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason,
            }],
        })
    }
}
