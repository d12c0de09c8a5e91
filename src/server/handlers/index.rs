use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::state::AppState;

pub async fn index_status(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let index = match state.index.load().await {
        Ok(index) => index,
        Err(ApiError::IndexNotFound(_)) => {
            return Ok(Json(json!({
                "exists": false,
                "chunks": 0,
                "location": state.index.dir(),
            })));
        }
        Err(e) => return Err(e),
    };

    let manifest = index.manifest().await?;
    Ok(Json(json!({
        "exists": true,
        "chunks": index.count().await?,
        "embedding_model": manifest.as_ref().map(|m| m.embedding_model.clone()),
        "dimension": manifest.as_ref().map(|m| m.dimension),
        "location": state.index.dir(),
    })))
}

/// Drops every indexed chunk so the index can be rebuilt.
pub async fn clear_index(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let _guard = state.ingest_lock.lock().await;

    let removed = match state.index.load().await {
        Ok(index) => index.clear().await?,
        Err(ApiError::IndexNotFound(_)) => 0,
        Err(e) => return Err(e),
    };

    tracing::info!("Cleared index: {} chunk(s) removed", removed);
    Ok(Json(json!({ "cleared": removed })))
}
