#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use docqa_backend::core::config::{AppConfig, AppPaths};
use docqa_backend::core::errors::ApiError;
use docqa_backend::llm::{ChatRequest, LlmProvider};
use docqa_backend::state::AppState;

const VOCABULARY: [&str; 6] = ["sky", "blue", "water", "wet", "color", "grass"];

/// Keyword-count embeddings and a chat model that quotes its context.
#[derive(Default)]
pub struct FakeProvider {
    pub embed_calls: AtomicUsize,
    pub chat_calls: AtomicUsize,
}

impl FakeProvider {
    pub fn chat_calls(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }
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
        let context = prompt
            .split("Context:\n")
            .nth(1)
            .and_then(|rest| rest.split("\n\nQuestion:").next())
            .unwrap_or_default()
            .to_string();
        Ok(format!("According to the context: {}", context))
    }

    async fn embed(&self, inputs: &[String], _model_id: &str) -> Result<Vec<Vec<f32>>, ApiError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        Ok(inputs
            .iter()
            .map(|text| {
                let lower = text.to_lowercase();
                let mut vector: Vec<f32> = VOCABULARY
                    .iter()
                    .map(|word| lower.matches(word).count() as f32)
                    .collect();
                vector.push(0.1);
                vector
            })
            .collect())
    }
}

pub struct TestApp {
    pub tmp: TempDir,
    pub state: Arc<AppState>,
    pub provider: Arc<FakeProvider>,
}

pub fn test_app() -> TestApp {
    test_app_with(AppConfig::default())
}

pub fn test_app_with(config: AppConfig) -> TestApp {
    let tmp = tempfile::tempdir().unwrap();
    let paths = Arc::new(AppPaths::with_dirs(
        tmp.path().to_path_buf(),
        tmp.path().join("data"),
    ));
    let provider = Arc::new(FakeProvider::default());
    let state = AppState::from_parts(paths, config, provider.clone(), provider.clone()).unwrap();

    TestApp {
        tmp,
        state: Arc::new(state),
        provider,
    }
}
