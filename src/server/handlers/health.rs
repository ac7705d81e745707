use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let index = state.retrieval.index_name();
    let status = if index.is_some() { "healthy" } else { "degraded" };
    Json(json!({
        "status": status,
        "vector_index": index,
        "embedding": state.retrieval.embedder().status(),
        "answer_backend": state.answers.backend_name().unwrap_or("extractive"),
        "documents": state.registry.document_count(),
        "sessions": state.registry.session_count(),
    }))
}
