//! Model name to backend selection.
//!
//! Two alias tables map the names clients send to backend model ids. A name in
//! neither table still routes: anything that looks like a Claude model goes to
//! Claude, everything else to Gemini, and the name is passed through unchanged.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::translate::openai_types::{ModelList, ModelObject};
use crate::translate::shared::unix_now;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Gemini,
    Claude,
}

impl Backend {
    pub fn owned_by(self) -> &'static str {
        match self {
            Backend::Gemini => "google",
            Backend::Claude => "anthropic",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Gemini => write!(f, "gemini"),
            Backend::Claude => write!(f, "claude"),
        }
    }
}

/// Where one request goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub backend: Backend,
    /// Backend model id.
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct ModelRouter {
    gemini: BTreeMap<String, String>,
    claude: BTreeMap<String, String>,
}

impl Default for ModelRouter {
    fn default() -> Self {
        Self::new(default_gemini_models(), default_claude_models())
    }
}

impl ModelRouter {
    pub fn new(gemini: BTreeMap<String, String>, claude: BTreeMap<String, String>) -> Self {
        Self { gemini, claude }
    }

    pub fn is_claude(&self, model: &str) -> bool {
        self.claude.contains_key(model) || model.starts_with("anthropic/") || model.starts_with("claude")
    }

    pub fn route(&self, model: &str) -> Route {
        let (backend, table) = if self.is_claude(model) {
            (Backend::Claude, &self.claude)
        } else {
            (Backend::Gemini, &self.gemini)
        };
        let mapped = table.get(model).cloned().unwrap_or_else(|| model.to_string());
        tracing::debug!(requested = model, %backend, backend_model = %mapped, "routed model");
        Route {
            backend,
            model: mapped,
        }
    }

    /// Gemini aliases first, then Claude aliases, each listed once.
    pub fn list(&self) -> ModelList {
        let created = unix_now();
        let mut seen = std::collections::HashSet::new();
        let data = self
            .gemini
            .keys()
            .map(|k| (k, Backend::Gemini))
            .chain(self.claude.keys().map(|k| (k, Backend::Claude)))
            .filter(|(k, _)| seen.insert(k.as_str()))
            .map(|(k, backend)| ModelObject {
                id: k.clone(),
                object: "model".to_string(),
                created,
                owned_by: backend.owned_by().to_string(),
            })
            .collect();

        ModelList {
            object: "list".to_string(),
            data,
        }
    }
}

fn table(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

pub fn default_gemini_models() -> BTreeMap<String, String> {
    table(&[
        ("google/gemini-3-pro-preview", "gemini-3-pro-preview"),
        ("google/gemini-3-flash-preview", "gemini-3-flash-preview"),
        ("google/gemini-3.1-pro-preview", "gemini-3.1-pro-preview"),
        ("gemini-3-pro-preview", "gemini-3-pro-preview"),
        ("gemini-3-flash-preview", "gemini-3-flash-preview"),
        ("gemini-3.1-pro-preview", "gemini-3.1-pro-preview"),
        ("google/gemini-2.5-pro", "gemini-2.5-pro"),
        ("google/gemini-2.5-flash", "gemini-2.5-flash"),
        ("google/gemini-2.5-flash-lite", "gemini-2.5-flash-lite"),
        ("google/gemini-2.5-flash-lite-preview-09-2025", "gemini-2.5-flash-lite-preview-09-2025"),
        ("gemini-2.5-pro", "gemini-2.5-pro"),
        ("gemini-2.5-flash", "gemini-2.5-flash"),
        ("gemini-2.5-flash-lite", "gemini-2.5-flash-lite"),
        ("gemini-2.5-flash-lite-preview-09-2025", "gemini-2.5-flash-lite-preview-09-2025"),
    ])
}

/// Values are Vertex model ids.
pub fn default_claude_models() -> BTreeMap<String, String> {
    table(&[
        ("anthropic/claude-sonnet-4.5", "claude-sonnet-4-5@20250929"),
        ("anthropic/claude-opus-4.5", "claude-opus-4-5@20251101"),
        ("anthropic/claude-haiku-4.5", "claude-haiku-4-5@20251001"),
        ("claude-sonnet-4.5", "claude-sonnet-4-5@20250929"),
        ("claude-opus-4.5", "claude-opus-4-5@20251101"),
        ("claude-haiku-4.5", "claude-haiku-4-5@20251001"),
    ])
}
