use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;
use crate::core::logging::truncate_for_log;
use crate::rag::Chunk;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct SourceSnippet {
    pub text: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub answer: String,
    pub sources: Vec<SourceSnippet>,
}

impl From<Chunk> for SourceSnippet {
    fn from(chunk: Chunk) -> Self {
        Self {
            text: chunk.text,
            source: chunk.source,
            page: chunk.page,
        }
    }
}

pub async fn ask(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    let answer = state.answerer.ask(&payload.question).await.map_err(|e| {
        tracing::error!(
            "Error answering '{}': {}",
            truncate_for_log(&payload.question, 50),
            e
        );
        e
    })?;

    Ok(Json(AskResponse {
        answer: answer.text,
        sources: answer.sources.into_iter().map(SourceSnippet::from).collect(),
    }))
}
