//! Backend capabilities.
//!
//! The proxy talks to each provider through a trait object so handlers and
//! tests never depend on a concrete HTTP client. Every implementation decodes
//! provider frames exactly once into the typed events the reassemblers consume.

pub mod claude;
pub mod gemini;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::{ProxyError, Result};
use crate::translate::claude::types::{ClaudeErrorResponse, ClaudeRequest, ClaudeResponse, ClaudeStreamEvent};
use crate::translate::gemini::types::{GeminiErrorResponse, GeminiRequest, GeminiResponse};
use crate::translate::shared::truncate;

pub use claude::HttpClaudeBackend;
pub use gemini::HttpGeminiBackend;

/// Typed events from one backend call. Dropping it aborts the call.
pub type BackendStream<T> = Pin<Box<dyn Stream<Item = Result<T>> + Send>>;

#[async_trait]
pub trait GeminiBackend: Send + Sync {
    async fn generate(&self, model: &str, request: &GeminiRequest) -> Result<GeminiResponse>;

    async fn stream(&self, model: &str, request: &GeminiRequest) -> Result<BackendStream<GeminiResponse>>;
}

#[async_trait]
pub trait ClaudeBackend: Send + Sync {
    async fn create(&self, model: &str, request: &ClaudeRequest) -> Result<ClaudeResponse>;

    async fn stream(&self, model: &str, request: &ClaudeRequest) -> Result<BackendStream<ClaudeStreamEvent>>;
}

/// Send a prepared request and turn a non-2xx reply into a backend error that
/// keeps the provider's status and message.
pub(crate) async fn send_checked(builder: reqwest::RequestBuilder) -> Result<reqwest::Response> {
    let response = builder.send().await.map_err(|e| {
        tracing::error!(error = %e, "upstream request failed");
        ProxyError::backend(None, format!("Request failed: {e}"))
    })?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::warn!(status = status.as_u16(), body = truncate(&body, 300), "upstream returned error");
    Err(ProxyError::backend(Some(status.as_u16()), error_message(status.as_u16(), &body)))
}

/// Pull the human-readable message out of either provider's error body.
pub(crate) fn error_message(status: u16, body: &str) -> String {
    if let Ok(err) = serde_json::from_str::<GeminiErrorResponse>(body) {
        if !err.error.message.is_empty() {
            return err.error.message;
        }
    }
    if let Ok(err) = serde_json::from_str::<ClaudeErrorResponse>(body) {
        if !err.error.message.is_empty() {
            return err.error.message;
        }
    }
    if let Ok(errs) = serde_json::from_str::<Vec<GeminiErrorResponse>>(body) {
        if let Some(err) = errs.into_iter().next() {
            return err.error.message;
        }
    }
    format!("Provider returned status {}: {}", status, truncate(body, 500))
}
