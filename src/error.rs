//! Error types for the proxy.

use thiserror::Error;

use crate::translate::openai_types::{ChatError, ChatErrorResponse};

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ProxyError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Malformed client input, detected before any backend call is made.
    #[error("Invalid request: {message}")]
    RequestShape { message: String },

    /// Network or provider failure. `status` is the provider's HTTP status when one was received.
    #[error("Backend error: {message}")]
    Backend { status: Option<u16>, message: String },

    #[error("Signature store error: {message}")]
    SignatureStore { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ProxyError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn request_shape(msg: impl Into<String>) -> Self {
        Self::RequestShape {
            message: msg.into(),
        }
    }

    pub fn backend(status: Option<u16>, msg: impl Into<String>) -> Self {
        Self::Backend {
            status,
            message: msg.into(),
        }
    }

    pub fn signature_store(msg: impl Into<String>) -> Self {
        Self::SignatureStore {
            message: msg.into(),
        }
    }

    /// HTTP status the client sees for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::RequestShape { .. } => 400,
            Self::Backend {
                status: Some(status),
                ..
            } if *status >= 400 => *status,
            Self::Backend { .. } => 502,
            _ => 500,
        }
    }

    /// OpenAI-style error body for this error.
    #[must_use]
    pub fn to_chat_error(&self) -> ChatErrorResponse {
        let (error_type, message) = match self {
            Self::RequestShape { message } => ("invalid_request_error", message.clone()),
            Self::Backend { message, .. } => ("api_error", message.clone()),
            other => ("api_error", other.to_string()),
        };

        ChatErrorResponse {
            error: ChatError {
                message,
                error_type: error_type.to_string(),
                code: None,
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape_is_client_error() {
        let err = ProxyError::request_shape("messages must not be empty");
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.to_chat_error().error.error_type, "invalid_request_error");
    }

    #[test]
    fn test_backend_status_passthrough() {
        assert_eq!(ProxyError::backend(Some(429), "slow down").status_code(), 429);
        assert_eq!(ProxyError::backend(None, "connection reset").status_code(), 502);
        assert_eq!(ProxyError::backend(Some(200), "bad frame").status_code(), 502);
    }

    #[test]
    fn test_local_failures_are_server_errors() {
        let json: ProxyError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert_eq!(json.status_code(), 500);
        assert!(json.to_chat_error().error.message.starts_with("JSON error"));

        let config = ProxyError::config("vertex flavor needs base_url");
        assert_eq!(config.status_code(), 500);
        assert_eq!(config.to_chat_error().error.error_type, "api_error");
    }
}
