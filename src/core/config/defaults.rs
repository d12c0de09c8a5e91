use serde_json::{json, Value};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;
pub const DEFAULT_TOP_K: usize = 4;
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Baseline configuration. Files on disk are deep-merged over this.
pub fn default_config() -> Value {
    json!({
        "server": {
            "host": "127.0.0.1",
            "port": 8000,
            "cors_allowed_origins": []
        },
        "chunking": {
            "chunk_size": DEFAULT_CHUNK_SIZE,
            "chunk_overlap": DEFAULT_CHUNK_OVERLAP
        },
        "retrieval": {
            "top_k": DEFAULT_TOP_K
        },
        "ingest": {
            "policy": "fail_fast",
            "max_upload_bytes": 50 * 1024 * 1024
        },
        "llm": {
            "base_url": DEFAULT_LLM_BASE_URL,
            "model": DEFAULT_CHAT_MODEL,
            "temperature": 0.1,
            "timeout_secs": 60
        },
        "embedding": {
            "model": DEFAULT_EMBEDDING_MODEL,
            "batch_size": 64,
            "timeout_secs": 60
        }
    })
}
