//! LLM client configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the Ollama client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Model used for distortion analysis
    #[serde(default = "default_model")]
    pub model: String,
    /// Model used to embed corpus chunks and queries
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    /// Temperature for generation (0.0 - 1.0), model default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Maximum tokens in an analysis response, unbounded when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// HTTP timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "gemma3:4b".to_string()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_timeout_secs() -> u64 {
    // 5 min timeout for slow local models
    300
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self::base_default().with_env_overrides()
    }
}

impl LlmConfig {
    /// Base default without env overrides.
    fn base_default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            embedding_model: default_embedding_model(),
            temperature: None,
            max_tokens: None,
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Check if the config equals the default (for skip_serializing_if).
    pub fn is_default(&self) -> bool {
        *self == Self::base_default()
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `OLLAMA_BASE_URL`: API endpoint
    /// - `OLLAMA_MODEL`: analysis model name
    /// - `OLLAMA_EMBED_MODEL`: embedding model name
    /// - `LLM_TEMPERATURE`: generation temperature
    /// - `LLM_MAX_TOKENS`: maximum tokens in an analysis response
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("OLLAMA_BASE_URL") {
            self.endpoint = val.trim_end_matches('/').to_string();
        }
        if let Ok(val) = std::env::var("OLLAMA_MODEL") {
            self.model = val;
        }
        if let Ok(val) = std::env::var("OLLAMA_EMBED_MODEL") {
            self.embedding_model = val;
        }
        if let Ok(val) = std::env::var("LLM_TEMPERATURE") {
            if let Ok(t) = val.parse() {
                self.temperature = Some(t);
            }
        }
        if let Ok(val) = std::env::var("LLM_MAX_TOKENS") {
            if let Ok(n) = val.parse() {
                self.max_tokens = Some(n);
            }
        }
        self
    }

    /// Hint shown when the service cannot be reached.
    pub fn availability_hint(&self) -> String {
        format!(
            "Ollama not reachable at {}. Start it with `ollama serve` and pull `{}`",
            self.endpoint, self.model
        )
    }
}
