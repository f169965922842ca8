//! Gemini `generateContent` wire format.
//!
//! Parts arrive as one object with optional members. [`GeminiPart::kind`] decodes
//! a part once into a [`PartKind`] so translation code never probes fields.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<GeminiContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<GeminiTool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_config: Option<GeminiToolConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety_settings: Option<Vec<SafetySetting>>,
}

impl GeminiRequest {
    /// Characters of text in the prompt, used for the token estimate.
    pub fn text_chars(&self) -> usize {
        self.system_instruction
            .iter()
            .chain(self.contents.iter())
            .flat_map(|c| c.parts.iter())
            .filter_map(|p| p.text.as_deref())
            .map(|t| t.chars().count())
            .sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiContent {
    /// "user" or "model"; absent on system instructions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

impl GeminiContent {
    pub fn new(role: &str, parts: Vec<GeminiPart>) -> Self {
        Self {
            role: Some(role.to_string()),
            parts,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Set on reasoning summaries; such text is not answer content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
    /// Base64 continuation token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought_signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_data: Option<FileData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<GeminiFunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<GeminiFunctionResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    pub mime_type: String,
    pub file_uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiFunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiFunctionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub response: serde_json::Value,
}

/// A part decoded into exactly one kind.
#[derive(Debug, Clone, PartialEq)]
pub enum PartKind {
    Text { text: String, thought: bool },
    InlineData(InlineData),
    FileData(FileData),
    FunctionCall {
        call: GeminiFunctionCall,
        signature: Option<Vec<u8>>,
    },
    FunctionResponse(GeminiFunctionResponse),
    Empty,
}

impl GeminiPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn inline_data(mime_type: &str, data: &[u8]) -> Self {
        Self {
            inline_data: Some(InlineData {
                mime_type: mime_type.to_string(),
                data: BASE64_STANDARD.encode(data),
            }),
            ..Self::default()
        }
    }

    pub fn file_data(mime_type: &str, file_uri: &str) -> Self {
        Self {
            file_data: Some(FileData {
                mime_type: mime_type.to_string(),
                file_uri: file_uri.to_string(),
            }),
            ..Self::default()
        }
    }

    pub fn function_call(
        id: Option<&str>,
        name: &str,
        args: serde_json::Value,
        signature: Option<&[u8]>,
    ) -> Self {
        Self {
            function_call: Some(GeminiFunctionCall {
                id: id.map(str::to_string),
                name: name.to_string(),
                args: Some(args),
            }),
            thought_signature: signature.map(|s| BASE64_STANDARD.encode(s)),
            ..Self::default()
        }
    }

    pub fn function_response(id: Option<&str>, name: &str, response: serde_json::Value) -> Self {
        Self {
            function_response: Some(GeminiFunctionResponse {
                id: id.map(str::to_string),
                name: name.to_string(),
                response,
            }),
            ..Self::default()
        }
    }

    /// Decode this part. A function call wins over any text on the same part;
    /// an undecodable signature is dropped.
    pub fn kind(&self) -> PartKind {
        if let Some(call) = &self.function_call {
            return PartKind::FunctionCall {
                call: call.clone(),
                signature: self.decoded_signature(),
            };
        }
        if let Some(response) = &self.function_response {
            return PartKind::FunctionResponse(response.clone());
        }
        if let Some(text) = &self.text {
            return PartKind::Text {
                text: text.clone(),
                thought: self.thought.unwrap_or(false),
            };
        }
        if let Some(data) = &self.inline_data {
            return PartKind::InlineData(data.clone());
        }
        if let Some(data) = &self.file_data {
            return PartKind::FileData(data.clone());
        }
        PartKind::Empty
    }

    fn decoded_signature(&self) -> Option<Vec<u8>> {
        let raw = self.thought_signature.as_deref().filter(|s| !s.is_empty())?;
        match BASE64_STANDARD.decode(raw) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!(error = %e, "thought signature is not valid base64, dropping");
                None
            }
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_json_schema: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiTool {
    pub function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDeclaration {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Raw JSON Schema; unlike `parameters` it is not restricted to the OpenAPI subset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters_json_schema: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiToolConfig {
    pub function_calling_config: FunctionCallingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCallingConfig {
    pub mode: FunctionCallingMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_function_names: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FunctionCallingMode {
    Auto,
    Any,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetySetting {
    pub category: String,
    pub threshold: String,
}

pub const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

/// Every harm category with blocking turned off.
pub fn safety_off() -> Vec<SafetySetting> {
    HARM_CATEGORIES
        .iter()
        .map(|category| SafetySetting {
            category: (*category).to_string(),
            threshold: "OFF".to_string(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Response types (also the streaming chunk shape)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<UsageMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
}

impl GeminiResponse {
    /// Parts of the first candidate, empty when it was blocked or carried none.
    pub fn parts(&self) -> &[GeminiPart] {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map_or(&[], |c| c.parts.as_slice())
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.candidates.first().and_then(|c| c.finish_reason.as_deref())
    }

    pub fn is_truncated(&self) -> bool {
        self.finish_reason() == Some("MAX_TOKENS")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<GeminiContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u64,
    #[serde(default)]
    pub candidates_token_count: u64,
    #[serde(default)]
    pub total_token_count: u64,
}

/// One decoded frame of `streamGenerateContent?alt=sse`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum GeminiStreamFrame {
    Error { error: GeminiErrorDetail },
    Chunk(GeminiResponse),
}

// ---------------------------------------------------------------------------
// Error response
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiErrorResponse {
    pub error: GeminiErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiErrorDetail {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_kind_decoding() {
        let part: GeminiPart = serde_json::from_str(
            r#"{"functionCall":{"name":"lookup","args":{"q":"x"}},"thoughtSignature":"c2ln"}"#,
        )
        .unwrap();
        match part.kind() {
            PartKind::FunctionCall { call, signature } => {
                assert_eq!(call.name, "lookup");
                assert_eq!(signature, Some(b"sig".to_vec()));
            }
            other => panic!("Expected function call, got {other:?}"),
        }

        let thought: GeminiPart = serde_json::from_str(r#"{"text":"hmm","thought":true}"#).unwrap();
        assert_eq!(
            thought.kind(),
            PartKind::Text {
                text: "hmm".to_string(),
                thought: true
            }
        );
        assert_eq!(GeminiPart::default().kind(), PartKind::Empty);
    }

    #[test]
    fn test_bad_signature_is_dropped() {
        let part: GeminiPart =
            serde_json::from_str(r#"{"functionCall":{"name":"f"},"thoughtSignature":"%%%"}"#).unwrap();
        assert!(matches!(part.kind(), PartKind::FunctionCall { signature: None, .. }));
    }

    #[test]
    fn test_request_serializes_camel_case() {
        let req = GeminiRequest {
            contents: vec![GeminiContent::new(
                "model",
                vec![GeminiPart::function_call(Some("call_1"), "f", serde_json::json!({}), Some(b"sig"))],
            )],
            tool_config: Some(GeminiToolConfig {
                function_calling_config: FunctionCallingConfig {
                    mode: FunctionCallingMode::Any,
                    allowed_function_names: Some(vec!["f".to_string()]),
                },
            }),
            ..GeminiRequest::default()
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["thoughtSignature"], "c2ln");
        assert_eq!(json["contents"][0]["parts"][0]["functionCall"]["id"], "call_1");
        assert_eq!(json["toolConfig"]["functionCallingConfig"]["mode"], "ANY");
        assert_eq!(
            json["toolConfig"]["functionCallingConfig"]["allowedFunctionNames"][0],
            "f"
        );
        assert!(json.get("systemInstruction").is_none());
    }

    #[test]
    fn test_stream_frame_error_variant() {
        let frame: GeminiStreamFrame =
            serde_json::from_str(r#"{"error":{"code":429,"message":"quota","status":"RESOURCE_EXHAUSTED"}}"#)
                .unwrap();
        assert!(matches!(frame, GeminiStreamFrame::Error { error } if error.code == 429));

        let frame: GeminiStreamFrame = serde_json::from_str(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hi"}]}}]}"#,
        )
        .unwrap();
        match frame {
            GeminiStreamFrame::Chunk(chunk) => assert_eq!(chunk.parts().len(), 1),
            GeminiStreamFrame::Error { .. } => panic!("Expected chunk"),
        }
    }
}
