//! API translation between the OpenAI chat schema and the two backends.
//!
//! The core of the proxy: converts requests, responses, and streaming events
//! between the universal format, Gemini and Claude. All translation functions
//! are pure (no I/O); continuation tokens are looked up before translation and
//! handed back as data after it.

pub mod claude;
pub mod gemini;
pub mod openai_types;
pub mod responses;
pub mod shared;
pub mod stream_state;

pub use stream_state::{ChatStreamEvent, Reassembler, StreamAccumulator};
