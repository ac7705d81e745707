use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::server::handlers::utils::tenant;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub session_id: String,
    pub description: Option<String>,
}

pub async fn create_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session_id = payload.session_id.trim();
    if session_id.is_empty() {
        return Err(ApiError::BadRequest("session_id is required".to_string()));
    }
    let user_id = tenant(&headers, &state);
    let session = state
        .registry
        .create_session(&user_id, session_id, payload.description);
    tracing::info!("Session {} created for {}", session.session_id, user_id);
    Ok(Json(json!({
        "session_id": session.session_id,
        "status": "success",
        "message": "Session created successfully",
        "session": session,
    })))
}

/// Remove a session's vectors, then its registry entry.
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = tenant(&headers, &state);
    if state.registry.get_session(&user_id, &session_id).is_none() {
        return Err(ApiError::NotFound("Session not found".to_string()));
    }

    let result = state.retrieval.delete_session(&session_id, &user_id).await?;
    state.registry.remove_session(&user_id, &session_id);

    tracing::info!(
        "Session {} deleted ({} vectors)",
        session_id,
        result.vectors_deleted
    );
    Ok(Json(json!({
        "message": "Session deleted successfully",
        "session_id": session_id,
        "vectors_deleted": result.vectors_deleted,
    })))
}
