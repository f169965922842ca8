use crate::error::{ProxyError, Result};
use crate::router::{default_claude_models, default_gemini_models, ModelRouter};
use crate::signature::DEFAULT_TTL_SECS;
use crate::translate::claude::DEFAULT_MAX_TOKENS;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "vertex-openai-proxy.toml";
const CONFIG_DIR_NAME: &str = "vertex-openai-proxy";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub claude: ClaudeConfig,
    #[serde(default)]
    pub signatures: SignatureConfig,
    #[serde(default)]
    pub models: ModelsConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            gemini: GeminiConfig::default(),
            claude: ClaudeConfig::default(),
            signatures: SignatureConfig::default(),
            models: ModelsConfig::default(),
        }
    }
}

/// How a backend is reached: its public API with an API key, or Vertex AI with
/// an OAuth access token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendFlavor {
    #[default]
    Direct,
    Vertex,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default)]
    pub flavor: BackendFlavor,
    /// For Vertex: `https://{location}-aiplatform.googleapis.com/v1/projects/{project}/locations/{location}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "default_gemini_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_true")]
    pub safety_off: bool,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            flavor: BackendFlavor::Direct,
            base_url: None,
            api_key_env: default_gemini_key_env(),
            safety_off: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaudeConfig {
    #[serde(default)]
    pub flavor: BackendFlavor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "default_claude_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u64,
}

impl Default for ClaudeConfig {
    fn default() -> Self {
        Self {
            flavor: BackendFlavor::Direct,
            base_url: None,
            api_key_env: default_claude_key_env(),
            default_max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: DEFAULT_TTL_SECS,
            max_entries: default_max_entries(),
        }
    }
}

/// Alias tables; a table given here replaces the built-in one entirely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gemini: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claude: Option<BTreeMap<String, String>>,
}

fn default_port() -> u16 {
    8080
}

fn default_true() -> bool {
    true
}

fn default_gemini_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_claude_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_max_tokens() -> u64 {
    DEFAULT_MAX_TOKENS
}

fn default_ttl_secs() -> u64 {
    DEFAULT_TTL_SECS
}

fn default_max_entries() -> u64 {
    100_000
}

impl ProxyConfig {
    /// Load config from a TOML file. Missing sections take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProxyError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Search standard locations for a config file.
    /// Priority: CLI arg > CWD > XDG config > home dir. Nothing found means defaults.
    pub fn find_and_load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::load(path);
        }

        for candidate in config_search_paths() {
            if candidate.exists() {
                tracing::info!(path = %candidate.display(), "Loading config");
                return Self::load(&candidate);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn router(&self) -> ModelRouter {
        ModelRouter::new(
            self.models.gemini.clone().unwrap_or_else(default_gemini_models),
            self.models.claude.clone().unwrap_or_else(default_claude_models),
        )
    }
}

impl GeminiConfig {
    pub fn effective_base_url(&self) -> Result<String> {
        if let Some(ref url) = self.base_url {
            return Ok(url.trim_end_matches('/').to_string());
        }
        match self.flavor {
            BackendFlavor::Direct => Ok("https://generativelanguage.googleapis.com/v1beta".to_string()),
            BackendFlavor::Vertex => Err(ProxyError::config(
                "[gemini] flavor = \"vertex\" needs base_url (https://{location}-aiplatform.googleapis.com/v1/projects/{project}/locations/{location})",
            )),
        }
    }
}

impl ClaudeConfig {
    pub fn effective_base_url(&self) -> Result<String> {
        if let Some(ref url) = self.base_url {
            return Ok(url.trim_end_matches('/').to_string());
        }
        match self.flavor {
            BackendFlavor::Direct => Ok("https://api.anthropic.com/v1".to_string()),
            BackendFlavor::Vertex => Err(ProxyError::config(
                "[claude] flavor = \"vertex\" needs base_url (https://{location}-aiplatform.googleapis.com/v1/projects/{project}/locations/{location})",
            )),
        }
    }
}

/// Read an API key or access token from the named environment variable.
pub fn resolve_key(env_var: &str) -> Result<String> {
    std::env::var(env_var).map_err(|_| {
        ProxyError::config(format!(
            "Environment variable '{env_var}' not set. Set it to your API key or access token."
        ))
    })
}

pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // CWD
    paths.push(PathBuf::from(CONFIG_FILE_NAME));

    // XDG / platform config dir
    if cfg!(target_os = "macos") {
        if let Some(home) = dirs_path() {
            paths.push(
                home.join("Library")
                    .join("Application Support")
                    .join(CONFIG_DIR_NAME)
                    .join("config.toml"),
            );
        }
    } else {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            paths.push(PathBuf::from(xdg).join(CONFIG_DIR_NAME).join("config.toml"));
        }
        if let Some(home) = dirs_path() {
            paths.push(home.join(".config").join(CONFIG_DIR_NAME).join("config.toml"));
        }
    }

    // Home directory fallback
    if let Some(home) = dirs_path() {
        paths.push(home.join(format!(".{CONFIG_FILE_NAME}")));
    }

    paths
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::Backend;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(
            f,
            r#"
port = 5000

[gemini]
flavor = "vertex"
base_url = "https://aiplatform.googleapis.com/v1/projects/p/locations/global/"
api_key_env = "VERTEX_TOKEN"
safety_off = false

[claude]
default_max_tokens = 8192

[signatures]
ttl_secs = 60

[models.claude]
"sonnet" = "claude-sonnet-4-5@20250929"
"#
        )
        .unwrap();

        let config = ProxyConfig::load(f.path()).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.gemini.flavor, BackendFlavor::Vertex);
        assert!(!config.gemini.safety_off);
        assert_eq!(
            config.gemini.effective_base_url().unwrap(),
            "https://aiplatform.googleapis.com/v1/projects/p/locations/global"
        );
        assert_eq!(config.claude.default_max_tokens, 8192);
        assert_eq!(config.claude.api_key_env, "ANTHROPIC_API_KEY");
        assert_eq!(config.signatures.ttl_secs, 60);
        assert!(config.signatures.enabled);

        let router = config.router();
        assert_eq!(router.route("sonnet").backend, Backend::Claude);
        // gemini table kept its defaults
        assert_eq!(router.route("google/gemini-2.5-pro").model, "gemini-2.5-pro");
        // claude table was replaced
        assert_eq!(router.route("claude-opus-4.5").model, "claude-opus-4.5");
    }

    #[test]
    fn test_empty_file_is_all_defaults() {
        let f = NamedTempFile::new().unwrap();
        let config = ProxyConfig::load(f.path()).unwrap();
        assert_eq!(config.port, 8080);
        assert!(config.gemini.safety_off);
        assert_eq!(config.claude.default_max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(config.signatures.ttl_secs, DEFAULT_TTL_SECS);
        assert_eq!(
            config.claude.effective_base_url().unwrap(),
            "https://api.anthropic.com/v1"
        );
    }

    #[test]
    fn test_vertex_without_base_url_is_error() {
        let config = ClaudeConfig {
            flavor: BackendFlavor::Vertex,
            ..ClaudeConfig::default()
        };
        assert!(matches!(config.effective_base_url(), Err(ProxyError::Config { .. })));
    }

    #[test]
    fn test_unknown_flavor_is_rejected() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "[gemini]\nflavor = \"grpc\"").unwrap();
        assert!(ProxyConfig::load(f.path()).is_err());
    }
}
