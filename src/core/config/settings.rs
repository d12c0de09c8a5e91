//! Typed view over the merged YAML configuration.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::defaults::{
    DEFAULT_CHAT_MODEL, DEFAULT_EMBEDDING_MODEL, DEFAULT_LLM_BASE_URL, DEFAULT_TOP_K,
};
use crate::core::errors::ApiError;
use crate::rag::chunker::ChunkingConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub ingest: IngestConfig,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of chunks retrieved per question.
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
        }
    }
}

/// What to do when one document of an upload batch fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestPolicy {
    /// Abort the whole batch; nothing is written.
    #[default]
    FailFast,
    /// Write the documents that succeeded and report the ones that failed.
    Partial,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub policy: IngestPolicy,
    pub max_upload_bytes: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            policy: IngestPolicy::FailFast,
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: Option<i32>,
    pub timeout_secs: u64,
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
            model: DEFAULT_CHAT_MODEL.to_string(),
            temperature: 0.1,
            max_tokens: None,
            timeout_secs: 60,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Falls back to `llm.base_url` when unset.
    pub base_url: Option<String>,
    pub model: String,
    pub batch_size: usize,
    pub timeout_secs: u64,
    /// Falls back to `llm.api_key` when unset.
    pub api_key: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            batch_size: 64,
            timeout_secs: 60,
            api_key: None,
        }
    }
}

impl AppConfig {
    pub fn from_value(value: &Value) -> Result<Self, ApiError> {
        let mut config: AppConfig = serde_json::from_value(value.clone())
            .map_err(|e| ApiError::BadRequest(format!("Invalid config: {}", e)))?;

        if config.embedding.base_url.is_none() {
            config.embedding.base_url = Some(config.llm.base_url.clone());
        }
        if config.embedding.api_key.is_none() {
            config.embedding.api_key = config.llm.api_key.clone();
        }
        Ok(config)
    }

    pub fn embedding_base_url(&self) -> &str {
        self.embedding
            .base_url
            .as_deref()
            .unwrap_or(&self.llm.base_url)
    }

    /// Both capabilities need a credential before the server may start.
    pub fn require_credentials(&self) -> Result<(), ApiError> {
        let missing = |key: &Option<String>| key.as_deref().map_or(true, |k| k.trim().is_empty());

        if missing(&self.llm.api_key) {
            return Err(ApiError::BadRequest(
                "Missing API key for the language model (set llm.api_key or OPENAI_API_KEY)"
                    .to_string(),
            ));
        }
        if missing(&self.embedding.api_key) {
            return Err(ApiError::BadRequest(
                "Missing API key for the embedding service (set embedding.api_key or OPENAI_API_KEY)"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn embedding_inherits_llm_endpoint_and_key() {
        let config = AppConfig::from_value(&json!({
            "llm": { "base_url": "http://localhost:1234", "api_key": "sk-test" }
        }))
        .unwrap();

        assert_eq!(config.embedding_base_url(), "http://localhost:1234");
        assert_eq!(config.embedding.api_key.as_deref(), Some("sk-test"));
        assert!(config.require_credentials().is_ok());
    }

    #[test]
    fn missing_credentials_are_rejected() {
        let config = AppConfig::from_value(&json!({})).unwrap();
        let err = config.require_credentials().unwrap_err();
        assert!(err.to_string().contains("language model"));
    }

    #[test]
    fn separate_embedding_key_is_kept() {
        let config = AppConfig::from_value(&json!({
            "llm": { "api_key": "chat-key" },
            "embedding": { "api_key": "embed-key", "base_url": "http://embed:9000" }
        }))
        .unwrap();

        assert_eq!(config.embedding.api_key.as_deref(), Some("embed-key"));
        assert_eq!(config.embedding_base_url(), "http://embed:9000");
    }

    #[test]
    fn ingest_policy_parses_snake_case() {
        let config = AppConfig::from_value(&json!({ "ingest": { "policy": "partial" } })).unwrap();
        assert_eq!(config.ingest.policy, IngestPolicy::Partial);
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.retrieval.top_k, 4);
    }
}
