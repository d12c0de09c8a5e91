//! Retrieval-augmented answering.

use std::sync::Arc;

use serde::Serialize;

use super::chunker::Chunk;
use super::context_builder::build_prompt;
use super::index::IndexLocation;
use crate::core::config::AppConfig;
use crate::core::errors::ApiError;
use crate::core::logging::truncate_for_log;
use crate::llm::{ChatMessage, ChatRequest, LlmProvider};

/// Returned when there is nothing to ground an answer in.
pub const NO_CONTEXT_ANSWER: &str =
    "I don't know. No documents have been ingested yet, so there is no context to answer from.";

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    /// Retrieved chunks, in retrieval order.
    pub sources: Vec<Chunk>,
}

#[derive(Debug, Clone)]
pub struct AnswerSettings {
    pub top_k: usize,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: Option<i32>,
}

impl AnswerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            top_k: config.retrieval.top_k,
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
        }
    }
}

pub struct Answerer {
    index: IndexLocation,
    llm: Arc<dyn LlmProvider>,
    settings: AnswerSettings,
}

impl Answerer {
    pub fn new(index: IndexLocation, llm: Arc<dyn LlmProvider>, settings: AnswerSettings) -> Self {
        Self {
            index,
            llm,
            settings,
        }
    }

    pub async fn ask(&self, question: &str) -> Result<Answer, ApiError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ApiError::BadRequest("question cannot be empty".to_string()));
        }
        tracing::info!("Question: {}", truncate_for_log(question, 50));

        let index = match self.index.load().await {
            Ok(index) => index,
            Err(ApiError::IndexNotFound(_)) => {
                tracing::info!("No index yet, declining to answer");
                return Ok(no_context_answer());
            }
            Err(e) => return Err(e),
        };

        let results = index.search(question, self.settings.top_k).await?;
        if results.is_empty() {
            tracing::info!("Index is empty, declining to answer");
            return Ok(no_context_answer());
        }

        let sources: Vec<Chunk> = results.into_iter().map(|r| r.chunk).collect();
        let prompt = build_prompt(question, &sources);

        let request = ChatRequest::new(vec![ChatMessage::user(prompt)])
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.max_tokens);

        let text = self.llm.chat(request, &self.settings.model).await?;
        if text.trim().is_empty() {
            return Err(ApiError::Generation(
                "language model returned an empty answer".to_string(),
            ));
        }

        tracing::info!(
            "Answered from {} chunk(s) via {}",
            sources.len(),
            self.llm.name()
        );
        Ok(Answer { text, sources })
    }
}

fn no_context_answer() -> Answer {
    Answer {
        text: NO_CONTEXT_ANSWER.to_string(),
        sources: Vec::new(),
    }
}
