//! Gemini `streamGenerateContent` chunks to chat completion chunks.
//!
//! Gemini streams whole parts, never partial function calls. Each call is
//! replayed as open, one arguments delta, close. Signatures found on a chunk are
//! queued so the proxy persists them before that chunk's events are sent.

use super::tools::tool_call_from_gemini;
use super::types::{GeminiResponse, PartKind};
use crate::signature::CapturedSignature;
use crate::translate::stream_state::{ChatStreamEvent, Reassembler, StreamAccumulator};

pub struct GeminiReassembler {
    acc: StreamAccumulator,
    captured: Vec<CapturedSignature>,
}

impl GeminiReassembler {
    pub fn new(model: &str) -> Self {
        Self {
            acc: StreamAccumulator::new(model),
            captured: Vec::new(),
        }
    }
}

impl Reassembler for GeminiReassembler {
    type Event = GeminiResponse;

    fn process(&mut self, chunk: GeminiResponse) -> Vec<ChatStreamEvent> {
        let mut events = Vec::new();
        if self.acc.is_done() {
            return events;
        }

        for part in chunk.parts() {
            match part.kind() {
                PartKind::Text { text, thought: false } => events.extend(self.acc.text(&text)),
                PartKind::FunctionCall { call, signature } => {
                    let tool_call = tool_call_from_gemini(&call);
                    if let Some(signature) = signature {
                        self.captured.push(CapturedSignature {
                            call_id: tool_call.id.clone(),
                            signature,
                        });
                    }
                    events.extend(self.acc.open_call(&tool_call.id, &tool_call.function.name));
                    events.extend(self.acc.call_arguments(&tool_call.function.arguments));
                    self.acc.close_call();
                }
                PartKind::Text { thought: true, .. } => {
                    tracing::trace!("skipping thought part");
                }
                PartKind::InlineData(_)
                | PartKind::FileData(_)
                | PartKind::FunctionResponse(_)
                | PartKind::Empty => {}
            }
        }

        if chunk.is_truncated() {
            self.acc.mark_truncated();
        }
        events
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

    fn take_signatures(&mut self) -> Vec<CapturedSignature> {
        std::mem::take(&mut self.captured)
    }
}
