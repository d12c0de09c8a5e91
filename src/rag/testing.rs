//! In-process stand-ins for the remote model endpoints.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::core::errors::ApiError;
use crate::llm::{ChatRequest, LlmProvider};

const VOCABULARY: [&str; 8] = ["sky", "blue", "water", "wet", "color", "grass", "green", "rust"];

/// Embeds text as keyword counts over a small vocabulary plus a constant bias
/// component, and answers chat requests by quoting the prompt's context block.
#[derive(Default)]
pub struct FakeProvider {
    pub embed_calls: AtomicUsize,
    pub chat_calls: AtomicUsize,
    pub last_prompt: Mutex<Option<String>>,
    fail_embeddings: bool,
    reply: Option<String>,
}

impl FakeProvider {
    pub fn failing_embeddings() -> Self {
        Self {
            fail_embeddings: true,
            ..Self::default()
        }
    }

    /// Answers every chat request with `reply` verbatim.
    pub fn with_reply(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
            ..Self::default()
        }
    }

    pub fn empty_answers() -> Self {
        Self::with_reply("  ")
    }
}

pub fn keyword_embedding(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    let mut vector: Vec<f32> = VOCABULARY
        .iter()
        .map(|word| lower.matches(word).count() as f32)
        .collect();
    vector.push(0.1);
    vector
}

#[async_trait]
impl LlmProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    async fn health_check(&self) -> Result<bool, ApiError> {
        Ok(true)
    }

    async fn chat(&self, request: ChatRequest, _model_id: &str) -> Result<String, ApiError> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        let prompt = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        *self.last_prompt.lock().unwrap() = Some(prompt.clone());

        if let Some(reply) = &self.reply {
            return Ok(reply.clone());
        }

        let context = prompt
            .split("Context:\n")
            .nth(1)
            .and_then(|rest| rest.split("\n\nQuestion:").next())
            .unwrap_or_default();
        Ok(format!("Based on the documents: {}", context))
    }

    async fn embed(&self, inputs: &[String], _model_id: &str) -> Result<Vec<Vec<f32>>, ApiError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_embeddings {
            return Err(ApiError::EmbeddingService(
                "embedding request failed with 503 Service Unavailable".to_string(),
            ));
        }
        Ok(inputs.iter().map(|text| keyword_embedding(text)).collect())
    }
}

/// Collects formatted log lines emitted on the current thread.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let sink = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(move || sink.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
