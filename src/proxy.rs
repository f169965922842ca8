//! Request orchestration: route, translate, call the backend, translate back.
//!
//! Translation is pure. Everything with side effects lives here: signature
//! lookup before a Gemini request is built, persisting the signatures a
//! response carried before its events go out, and one journal record per
//! exchange.

use std::pin::Pin;
use std::time::Instant;

use futures::stream::{Stream, StreamExt};

use crate::backend::BackendStream;
use crate::error::{ProxyError, Result};
use crate::logging::{ApiKind, ExchangeRecord, SharedJournal};
use crate::router::{Backend, Route};
use crate::server::AppState;
use crate::signature::SignatureCorrelator;
use crate::translate::claude::{self, ClaudeOptions, ClaudeReassembler};
use crate::translate::gemini::types::GeminiRequest;
use crate::translate::gemini::{self, GeminiOptions, GeminiReassembler};
use crate::translate::openai_types::{ChatCompletionRequest, ChatCompletionResponse};
use crate::translate::responses::{self, ResponseObject, ResponsesRequest, ResponsesStreamAdapter, ResponsesStreamEvent};
use crate::translate::{ChatStreamEvent, Reassembler};

/// Outbound chat events, always ending with [`ChatStreamEvent::Done`].
pub type ChatEventStream = Pin<Box<dyn Stream<Item = ChatStreamEvent> + Send>>;

/// Outbound Responses events, always ending with [`ResponsesStreamEvent::Done`].
pub type ResponsesEventStream = Pin<Box<dyn Stream<Item = ResponsesStreamEvent> + Send>>;

/// Handle a non-streaming chat completion.
pub async fn chat_completion(state: &AppState, req: &ChatCompletionRequest) -> Result<ChatCompletionResponse> {
    complete(state, req, ApiKind::Chat).await
}

/// Handle a streaming chat completion. Errors returned here happen before any
/// event exists (malformed input); everything later is an in-stream error event.
pub async fn chat_completion_stream(state: &AppState, req: &ChatCompletionRequest) -> Result<ChatEventStream> {
    open_stream(state, req, ApiKind::Chat).await
}

/// Handle a non-streaming Responses API call.
pub async fn create_response(state: &AppState, req: &ResponsesRequest) -> Result<ResponseObject> {
    let chat = responses::to_chat_request(req);
    let result = complete(state, &chat, ApiKind::Responses).await?;
    Ok(responses::from_chat_response(&result, req))
}

/// Handle a streaming Responses API call.
pub async fn create_response_stream(state: &AppState, req: &ResponsesRequest) -> Result<ResponsesEventStream> {
    let chat = responses::to_chat_request(req);
    let mut events = open_stream(state, &chat, ApiKind::Responses).await?;
    let mut adapter = ResponsesStreamAdapter::new(&req.model);

    Ok(Box::pin(async_stream::stream! {
        yield adapter.created();
        while let Some(event) = events.next().await {
            let done = event.is_done();
            for out in adapter.adapt(event) {
                yield out;
            }
            if done {
                break;
            }
        }
    }))
}

async fn complete(state: &AppState, req: &ChatCompletionRequest, api: ApiKind) -> Result<ChatCompletionResponse> {
    let started = Instant::now();
    let route = state.router.route(&req.model);
    let record = ExchangeRecord::new(new_request_id(), api, &req.model, &route, false);

    let result = complete_routed(state, req, &route).await;
    match &result {
        Ok(response) => {
            let tool_calls = response
                .message()
                .and_then(|m| m.tool_calls.as_ref())
                .map_or(0, Vec::len);
            state
                .journal
                .record(record.completed(response.finish_reason(), tool_calls, started));
        }
        Err(e) => state.journal.record(record.failed(e.to_string(), started)),
    }
    result
}

async fn complete_routed(state: &AppState, req: &ChatCompletionRequest, route: &Route) -> Result<ChatCompletionResponse> {
    match route.backend {
        Backend::Gemini => {
            let body = gemini_body(state, req).await?;
            let response = state.gemini.generate(&route.model, &body).await?;
            let assembly = gemini::assemble(&response, &req.model, body.text_chars());
            state.correlator.persist(assembly.signatures).await;
            Ok(assembly.response)
        }
        Backend::Claude => {
            let body = claude::build_request(req, claude_options(state))?;
            let response = state.claude.create(&route.model, &body).await?;
            Ok(claude::assemble(&response, &req.model, prompt_chars(req)))
        }
    }
}

async fn open_stream(state: &AppState, req: &ChatCompletionRequest, api: ApiKind) -> Result<ChatEventStream> {
    let started = Instant::now();
    let route = state.router.route(&req.model);
    let record = ExchangeRecord::new(new_request_id(), api, &req.model, &route, true);
    let reject = |e: ProxyError| {
        state.journal.record(record.clone().failed(e.to_string(), started));
        e
    };

    let driver = StreamDriver {
        correlator: state.correlator.clone(),
        journal: state.journal.clone(),
        record: record.clone(),
        started,
    };

    match route.backend {
        Backend::Gemini => {
            let body = gemini_body(state, req).await.map_err(reject)?;
            let opened = state.gemini.stream(&route.model, &body).await;
            Ok(driver.drive(GeminiReassembler::new(&req.model), opened))
        }
        Backend::Claude => {
            let body = claude::build_request(req, claude_options(state)).map_err(reject)?;
            let opened = state.claude.stream(&route.model, &body).await;
            Ok(driver.drive(ClaudeReassembler::new(&req.model), opened))
        }
    }
}

/// Look up the signatures of every replayed call, then build the Gemini body.
async fn gemini_body(state: &AppState, req: &ChatCompletionRequest) -> Result<GeminiRequest> {
    let call_ids = gemini::replayed_call_ids(req);
    let signatures = if call_ids.is_empty() {
        Default::default()
    } else {
        state.correlator.lookup_all(&call_ids).await
    };
    tracing::debug!(replayed = call_ids.len(), with_signature = signatures.len(), "signature lookup");

    let options = GeminiOptions {
        safety_off: state.config.gemini.safety_off,
    };
    gemini::build_request(req, &signatures, options)
}

fn claude_options(state: &AppState) -> ClaudeOptions {
    ClaudeOptions {
        default_max_tokens: state.config.claude.default_max_tokens,
    }
}

fn prompt_chars(req: &ChatCompletionRequest) -> usize {
    req.messages.iter().map(|m| m.text().chars().count()).sum()
}

fn new_request_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Owns the side effects of one streamed exchange.
struct StreamDriver {
    correlator: SignatureCorrelator,
    journal: SharedJournal,
    record: ExchangeRecord,
    started: Instant,
}

impl StreamDriver {
    /// Pump backend events through `reassembler` until the sentinel.
    ///
    /// Signatures captured from an event are stored before that event's
    /// output is yielded. A failure to open, a transport error and an in-band
    /// error all end in one error event and the sentinel.
    fn drive<R>(self, mut reassembler: R, opened: Result<BackendStream<R::Event>>) -> ChatEventStream
    where
        R: Reassembler + 'static,
        R::Event: 'static,
    {
        let Self {
            correlator,
            journal,
            record,
            started,
        } = self;

        Box::pin(async_stream::stream! {
            let mut failure: Option<String> = None;
            let mut done = false;

            match opened {
                Ok(mut events) => {
                    while let Some(item) = events.next().await {
                        let out = match item {
                            Ok(event) => reassembler.process(event),
                            Err(e) => {
                                tracing::warn!(error = %e, "backend stream failed");
                                reassembler.fail(&e.to_string())
                            }
                        };
                        correlator.persist(reassembler.take_signatures()).await;

                        for event in out {
                            done |= event.is_done();
                            if let ChatStreamEvent::Error(ref err) = event {
                                failure.get_or_insert_with(|| err.error.message.clone());
                            }
                            yield event;
                        }
                        if done {
                            break;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "backend stream failed to open");
                    for event in reassembler.fail(&e.to_string()) {
                        done |= event.is_done();
                        if let ChatStreamEvent::Error(ref err) = event {
                            failure.get_or_insert_with(|| err.error.message.clone());
                        }
                        yield event;
                    }
                }
            }

            if !done {
                for event in reassembler.finish() {
                    yield event;
                }
            }

            let acc = reassembler.accumulator();
            let record = match failure {
                Some(message) => record.failed(message, started),
                None => record.completed(acc.finish_reason(), acc.slots().len(), started),
            };
            journal.record(record);
        })
    }
}
