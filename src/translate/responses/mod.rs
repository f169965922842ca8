//! The Responses API as a layer over chat completions: requests are rewritten
//! inbound, results and stream events re-framed outbound.

pub mod request;
pub mod response;
pub mod streaming;
pub mod types;

pub use request::to_chat_request;
pub use response::from_chat_response;
pub use streaming::ResponsesStreamAdapter;
pub use types::{ResponseObject, ResponsesRequest, ResponsesStreamEvent};
