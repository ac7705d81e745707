use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("vector index unavailable")]
    IndexUnavailable,
    #[error("embedding failure: {0}")]
    EmbeddingFailure(String),
    #[error("backend timeout: {0}")]
    BackendTimeout(String),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Internal(err.to_string())
    }

    /// Only timeouts are worth retrying; the core never retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::BackendTimeout(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::IndexUnavailable => "index_unavailable",
            ApiError::EmbeddingFailure(_) => "embedding_failure",
            ApiError::BackendTimeout(_) => "backend_timeout",
            ApiError::Backend(_) => "backend",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::NotFound(_) => "not_found",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::IndexUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::EmbeddingFailure(_) | ApiError::Backend(_) => StatusCode::BAD_GATEWAY,
            ApiError::BackendTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let message = match &self {
            ApiError::IndexUnavailable => "Vector index unavailable".to_string(),
            ApiError::EmbeddingFailure(msg)
            | ApiError::BackendTimeout(msg)
            | ApiError::Backend(msg)
            | ApiError::BadRequest(msg)
            | ApiError::NotFound(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Internal(msg) => msg.clone(),
        };

        if status.is_server_error() {
            tracing::error!(kind = self.kind(), "{}", message);
        }

        let body = Json(json!({
            "error": message,
            "kind": self.kind(),
            "retryable": self.is_retryable(),
        }));
        (status, body).into_response()
    }
}
