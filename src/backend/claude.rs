//! Claude over HTTP, either the Messages API or Vertex AI `rawPredict`.

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;

use super::{send_checked, BackendStream, ClaudeBackend};
use crate::config::{resolve_key, BackendFlavor, ClaudeConfig};
use crate::error::{ProxyError, Result};
use crate::translate::claude::types::{ClaudeRequest, ClaudeResponse, ClaudeStreamEvent};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const VERTEX_ANTHROPIC_VERSION: &str = "vertex-2023-10-16";

pub struct HttpClaudeBackend {
    client: reqwest::Client,
    flavor: BackendFlavor,
    base_url: String,
    api_key_env: String,
}

impl HttpClaudeBackend {
    pub fn new(client: reqwest::Client, config: &ClaudeConfig) -> Result<Self> {
        Ok(Self {
            client,
            flavor: config.flavor,
            base_url: config.effective_base_url()?,
            api_key_env: config.api_key_env.clone(),
        })
    }

    fn url(&self, model: &str, stream: bool) -> String {
        match self.flavor {
            BackendFlavor::Direct => format!("{}/messages", self.base_url),
            BackendFlavor::Vertex => {
                let method = if stream { "streamRawPredict" } else { "rawPredict" };
                format!("{}/publishers/anthropic/models/{}:{}", self.base_url, model, method)
            }
        }
    }

    /// The direct API names the model in the body; Vertex names it in the URL
    /// and wants its own version marker instead.
    fn body(&self, model: &str, request: &ClaudeRequest, stream: bool) -> ClaudeRequest {
        let mut body = request.clone();
        body.stream = stream.then_some(true);
        match self.flavor {
            BackendFlavor::Direct => {
                body.model = Some(model.to_string());
                body.anthropic_version = None;
            }
            BackendFlavor::Vertex => {
                body.model = None;
                body.anthropic_version = Some(VERTEX_ANTHROPIC_VERSION.to_string());
            }
        }
        body
    }

    fn post(&self, model: &str, request: &ClaudeRequest, stream: bool) -> Result<reqwest::RequestBuilder> {
        let key = resolve_key(&self.api_key_env)?;
        let url = self.url(model, stream);
        tracing::info!(%url, stream, "POST claude");

        let builder = self.client.post(url).json(&self.body(model, request, stream));
        Ok(match self.flavor {
            BackendFlavor::Direct => builder
                .header("x-api-key", key)
                .header("anthropic-version", ANTHROPIC_VERSION),
            BackendFlavor::Vertex => builder.bearer_auth(key),
        })
    }
}

#[async_trait]
impl ClaudeBackend for HttpClaudeBackend {
    async fn create(&self, model: &str, request: &ClaudeRequest) -> Result<ClaudeResponse> {
        let response = send_checked(self.post(model, request, false)?).await?;
        response
            .json::<ClaudeResponse>()
            .await
            .map_err(|e| ProxyError::backend(None, format!("Failed to parse Claude response: {e}")))
    }

    async fn stream(&self, model: &str, request: &ClaudeRequest) -> Result<BackendStream<ClaudeStreamEvent>> {
        let response = send_checked(self.post(model, request, true)?).await?;

        let events = response.bytes_stream().eventsource().filter_map(|event| {
            let decoded = match event {
                Ok(event) => decode_event(&event.data),
                Err(e) => Some(Err(ProxyError::backend(None, format!("Stream interrupted: {e}")))),
            };
            async move { decoded }
        });

        Ok(Box::pin(events))
    }
}

/// In-band `error` events pass through as events; the reassembler ends the
/// stream on them.
fn decode_event(data: &str) -> Option<Result<ClaudeStreamEvent>> {
    let data = data.trim();
    if data.is_empty() {
        return None;
    }
    match serde_json::from_str::<ClaudeStreamEvent>(data) {
        Ok(ClaudeStreamEvent::Ping | ClaudeStreamEvent::Unknown) => None,
        Ok(event) => Some(Ok(event)),
        Err(e) => {
            tracing::debug!(error = %e, "skipping unparseable Claude SSE event");
            None
        }
    }
}
