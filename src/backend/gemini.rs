//! Gemini over HTTP, either the public API or Vertex AI.

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;

use super::{send_checked, BackendStream, GeminiBackend};
use crate::config::{resolve_key, BackendFlavor, GeminiConfig};
use crate::error::{ProxyError, Result};
use crate::translate::gemini::types::{GeminiRequest, GeminiResponse, GeminiStreamFrame};

pub struct HttpGeminiBackend {
    client: reqwest::Client,
    flavor: BackendFlavor,
    base_url: String,
    api_key_env: String,
}

impl HttpGeminiBackend {
    pub fn new(client: reqwest::Client, config: &GeminiConfig) -> Result<Self> {
        Ok(Self {
            client,
            flavor: config.flavor,
            base_url: config.effective_base_url()?,
            api_key_env: config.api_key_env.clone(),
        })
    }

    fn url(&self, model: &str, method: &str) -> String {
        match self.flavor {
            BackendFlavor::Direct => format!("{}/models/{}:{}", self.base_url, model, method),
            BackendFlavor::Vertex => format!("{}/publishers/google/models/{}:{}", self.base_url, model, method),
        }
    }

    fn post(&self, url: &str, request: &GeminiRequest) -> Result<reqwest::RequestBuilder> {
        let key = resolve_key(&self.api_key_env)?;
        let builder = self.client.post(url).json(request);
        Ok(match self.flavor {
            BackendFlavor::Direct => builder.header("x-goog-api-key", key),
            BackendFlavor::Vertex => builder.bearer_auth(key),
        })
    }
}

#[async_trait]
impl GeminiBackend for HttpGeminiBackend {
    async fn generate(&self, model: &str, request: &GeminiRequest) -> Result<GeminiResponse> {
        let url = self.url(model, "generateContent");
        tracing::info!(%url, "POST generateContent");

        let response = send_checked(self.post(&url, request)?).await?;
        let body = response
            .text()
            .await
            .map_err(|e| ProxyError::backend(None, format!("Failed to read response body: {e}")))?;

        match serde_json::from_str::<GeminiStreamFrame>(&body) {
            Ok(GeminiStreamFrame::Chunk(parsed)) => Ok(parsed),
            Ok(GeminiStreamFrame::Error { error }) => Err(ProxyError::backend(Some(error.code), error.message)),
            Err(e) => Err(ProxyError::backend(None, format!("Failed to parse Gemini response: {e}"))),
        }
    }

    async fn stream(&self, model: &str, request: &GeminiRequest) -> Result<BackendStream<GeminiResponse>> {
        let url = format!("{}?alt=sse", self.url(model, "streamGenerateContent"));
        tracing::info!(%url, "POST streamGenerateContent");

        let response = send_checked(self.post(&url, request)?).await?;

        let frames = response.bytes_stream().eventsource().filter_map(|event| {
            let decoded = match event {
                Ok(event) => decode_frame(&event.data),
                Err(e) => Some(Err(ProxyError::backend(None, format!("Stream interrupted: {e}")))),
            };
            async move { decoded }
        });

        Ok(Box::pin(frames))
    }
}

/// One SSE data payload to a chunk. Blank and unrecognised payloads are skipped.
fn decode_frame(data: &str) -> Option<Result<GeminiResponse>> {
    let data = data.trim();
    if data.is_empty() {
        return None;
    }
    match serde_json::from_str::<GeminiStreamFrame>(data) {
        Ok(GeminiStreamFrame::Chunk(chunk)) => Some(Ok(chunk)),
        Ok(GeminiStreamFrame::Error { error }) => {
            let status = (error.code >= 400).then_some(error.code);
            Some(Err(ProxyError::backend(status, error.message)))
        }
        Err(e) => {
            tracing::debug!(error = %e, "skipping unparseable Gemini SSE frame");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(flavor: BackendFlavor, base_url: &str) -> HttpGeminiBackend {
        let config = GeminiConfig {
            flavor,
            base_url: Some(base_url.to_string()),
            ..GeminiConfig::default()
        };
        HttpGeminiBackend::new(reqwest::Client::new(), &config).unwrap()
    }

    #[test]
    fn test_urls_per_flavor() {
        let direct = backend(BackendFlavor::Direct, "https://generativelanguage.googleapis.com/v1beta/");
        assert_eq!(
            direct.url("gemini-2.5-pro", "generateContent"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-pro:generateContent"
        );

        let vertex = backend(
            BackendFlavor::Vertex,
            "https://us-central1-aiplatform.googleapis.com/v1/projects/p/locations/us-central1",
        );
        assert_eq!(
            vertex.url("gemini-2.5-pro", "streamGenerateContent"),
            "https://us-central1-aiplatform.googleapis.com/v1/projects/p/locations/us-central1/publishers/google/models/gemini-2.5-pro:streamGenerateContent"
        );
    }

    #[test]
    fn test_decode_frame() {
        assert!(decode_frame("  ").is_none());
        assert!(decode_frame("not json").is_none());

        let chunk = decode_frame(r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hi"}]}}]}"#);
        assert!(matches!(chunk, Some(Ok(ref c)) if c.parts().len() == 1));

        let err = decode_frame(r#"{"error":{"code":503,"message":"overloaded","status":"UNAVAILABLE"}}"#);
        match err {
            Some(Err(ProxyError::Backend { status, message })) => {
                assert_eq!(status, Some(503));
                assert_eq!(message, "overloaded");
            }
            other => panic!("Expected backend error, got {other:?}"),
        }
    }
}
