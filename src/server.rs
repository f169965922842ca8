use crate::backend::{ClaudeBackend, GeminiBackend, HttpClaudeBackend, HttpGeminiBackend};
use crate::config::ProxyConfig;
use crate::error::{ProxyError, Result};
use crate::logging::SharedJournal;
use crate::proxy;
use crate::router::ModelRouter;
use crate::signature::{MemorySignatureStore, SignatureCorrelator};
use crate::translate::openai_types::{ChatCompletionRequest, ModelList};
use crate::translate::responses::ResponsesRequest;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::StreamExt;
use serde::de::DeserializeOwned;
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Everything a handler needs. Backends and the signature store are trait
/// objects so tests can swap in fakes.
#[derive(Clone)]
pub struct AppState {
    pub config: ProxyConfig,
    pub router: ModelRouter,
    pub gemini: Arc<dyn GeminiBackend>,
    pub claude: Arc<dyn ClaudeBackend>,
    pub correlator: SignatureCorrelator,
    pub journal: SharedJournal,
}

impl AppState {
    pub fn new(
        config: ProxyConfig,
        gemini: Arc<dyn GeminiBackend>,
        claude: Arc<dyn ClaudeBackend>,
        journal: SharedJournal,
    ) -> Self {
        let correlator = if config.signatures.enabled {
            let store = MemorySignatureStore::new(config.signatures.ttl_secs, config.signatures.max_entries);
            SignatureCorrelator::new(Arc::new(store), config.signatures.ttl_secs)
        } else {
            SignatureCorrelator::disabled()
        };

        Self {
            router: config.router(),
            config,
            gemini,
            claude,
            correlator,
            journal,
        }
    }

    /// State with the HTTP backends described by `config`.
    pub fn from_config(config: ProxyConfig, client: reqwest::Client, journal: SharedJournal) -> Result<Self> {
        let gemini = HttpGeminiBackend::new(client.clone(), &config.gemini)?;
        let claude = HttpClaudeBackend::new(client, &config.claude)?;
        Ok(Self::new(config, Arc::new(gemini), Arc::new(claude), journal))
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/v1/models", get(handle_models))
        .route("/v1/chat/completions", post(handle_chat_completions))
        .route("/v1/responses", post(handle_responses))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_chat_completions(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let req: ChatCompletionRequest = match parse_body(&body) {
        Ok(r) => r,
        Err(e) => return error_response(&e),
    };

    let is_streaming = req.stream.unwrap_or(false);
    tracing::info!(
        model = %req.model,
        streaming = is_streaming,
        messages = req.messages.len(),
        "chat completion request"
    );

    if is_streaming {
        match proxy::chat_completion_stream(&state, &req).await {
            Ok(events) => sse_response(events.map(|e| e.sse_data())),
            Err(e) => error_response(&e),
        }
    } else {
        match proxy::chat_completion(&state, &req).await {
            Ok(resp) => Json(resp).into_response(),
            Err(e) => error_response(&e),
        }
    }
}

async fn handle_responses(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let req: ResponsesRequest = match parse_body(&body) {
        Ok(r) => r,
        Err(e) => return error_response(&e),
    };

    let is_streaming = req.stream.unwrap_or(false);
    tracing::info!(model = %req.model, streaming = is_streaming, "responses request");

    if is_streaming {
        match proxy::create_response_stream(&state, &req).await {
            Ok(events) => sse_response(events.map(|e| e.sse_data())),
            Err(e) => error_response(&e),
        }
    } else {
        match proxy::create_response(&state, &req).await {
            Ok(resp) => Json(resp).into_response(),
            Err(e) => error_response(&e),
        }
    }
}

async fn handle_models(State(state): State<Arc<AppState>>) -> Json<ModelList> {
    Json(state.router.list())
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn handle_root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "endpoints": ["/v1/chat/completions", "/v1/responses", "/v1/models", "/health"],
    }))
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::warn!(error = %e, "failed to parse request body");
        ProxyError::request_shape(format!("Invalid request body: {e}"))
    })
}

fn error_response(err: &ProxyError) -> Response {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::BAD_GATEWAY);
    if status.is_server_error() {
        tracing::error!(error = %err, status = status.as_u16(), "request failed");
    } else {
        tracing::warn!(error = %err, status = status.as_u16(), "request rejected");
    }
    (status, Json(err.to_chat_error())).into_response()
}

fn sse_response<S>(frames: S) -> Response
where
    S: futures::Stream<Item = String> + Send + 'static,
{
    let events = frames.map(|data| -> std::result::Result<Event, Infallible> { Ok(Event::default().data(data)) });
    Sse::new(events).keep_alive(KeepAlive::default()).into_response()
}
