use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::Json;

use crate::core::errors::ApiError;
use crate::rag::{IngestReport, UploadedFile};
use crate::state::AppState;

/// Accepts a multipart form with one file part per document.
pub async fn upload_documents(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<IngestReport>, ApiError> {
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read {}: {}", filename, e)))?;
        files.push(UploadedFile::new(filename, bytes.to_vec()));
    }

    let _guard = state.ingest_lock.lock().await;
    let report = state.ingest.ingest(files).await?;
    Ok(Json(report))
}
