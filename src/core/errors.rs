use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(String),
    #[error("vector store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("generation unavailable: {0}")]
    GenerationUnavailable(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl RagError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        RagError::Internal(err.to_string())
    }
}

impl IntoResponse for RagError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            RagError::UnsupportedFormat(msg) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, msg.clone())
            }
            RagError::EmbeddingUnavailable(msg)
            | RagError::StoreUnavailable(msg)
            | RagError::GenerationUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, msg.clone())
            }
            RagError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            RagError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            RagError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}
