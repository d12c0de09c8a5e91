use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("extraction error: {0}")]
    Extraction(String),
    #[error("embedding service error: {0}")]
    EmbeddingService(String),
    #[error("index not found: {0}")]
    IndexNotFound(String),
    #[error("generation error: {0}")]
    Generation(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Internal(err.to_string())
    }

    pub fn embedding<E: std::fmt::Display>(err: E) -> Self {
        ApiError::EmbeddingService(err.to_string())
    }

    pub fn generation<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Generation(err.to_string())
    }

    /// Stable machine-readable name, returned to clients next to the message.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::UnsupportedFormat(_) => "unsupported_format",
            ApiError::Extraction(_) => "extraction_error",
            ApiError::EmbeddingService(_) => "embedding_service_error",
            ApiError::IndexNotFound(_) => "index_not_found",
            ApiError::Generation(_) => "generation_error",
            ApiError::Io(_) => "io_error",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::Extraction(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::EmbeddingService(_) | ApiError::Generation(_) => StatusCode::BAD_GATEWAY,
            ApiError::IndexNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Io(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = Json(json!({
            "error": self.to_string(),
            "kind": self.kind(),
        }));
        (self.status(), body).into_response()
    }
}
