use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::answer::AnswerQuality;
use crate::core::errors::ApiError;
use crate::pipeline::ProcessedDocument;
use crate::retrieval::{SearchRequest, UNKNOWN_DOCUMENT_TYPE};
use crate::server::handlers::utils::tenant;
use crate::state::AppState;

fn unknown_document_type() -> String {
    UNKNOWN_DOCUMENT_TYPE.to_string()
}

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    pub filename: String,
    pub content: String,
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmbedRequest {
    pub document_id: String,
    #[serde(default = "unknown_document_type")]
    pub document_type: String,
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub question: String,
    #[serde(default = "unknown_document_type")]
    pub document_type: String,
    pub document_id: Option<String>,
    pub session_id: Option<String>,
    pub top_k: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub session_id: Option<String>,
}

pub async fn upload(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<UploadRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = tenant(&headers, &state);
    let processed = state.pipeline.process(&payload.filename, &payload.content)?;
    let record = state
        .registry
        .register_document(&processed, &user_id, payload.session_id.as_deref());
    Ok(Json(record))
}

pub async fn upload_and_embed(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<UploadRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = tenant(&headers, &state);
    let processed = state.pipeline.process(&payload.filename, &payload.content)?;
    let response =
        register_and_store(&state, &processed, &user_id, payload.session_id.as_deref()).await?;
    Ok(Json(response))
}

/// Multipart upload of a raw file (`file`), with optional `session_id` and
/// `embed` fields. Binary formats such as PDF and DOCX only arrive this way.
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = tenant(&headers, &state);
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut session_id: Option<String> = None;
    let mut embed = true;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::BadRequest(err.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| ApiError::BadRequest("file field has no filename".to_string()))?;
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| ApiError::BadRequest(err.to_string()))?;
                file = Some((filename, bytes.to_vec()));
            }
            "session_id" => {
                let value = field
                    .text()
                    .await
                    .map_err(|err| ApiError::BadRequest(err.to_string()))?;
                session_id = Some(value.trim().to_string()).filter(|s| !s.is_empty());
            }
            "embed" => {
                let value = field
                    .text()
                    .await
                    .map_err(|err| ApiError::BadRequest(err.to_string()))?;
                embed = !matches!(value.trim().to_ascii_lowercase().as_str(), "false" | "0" | "no");
            }
            other => tracing::debug!("Ignoring multipart field '{}'", other),
        }
    }

    let (filename, bytes) =
        file.ok_or_else(|| ApiError::BadRequest("missing 'file' field".to_string()))?;
    let processed = state.pipeline.process_bytes(&filename, &bytes)?;

    if !embed {
        let record = state
            .registry
            .register_document(&processed, &user_id, session_id.as_deref());
        return Ok(Json(serde_json::to_value(record).map_err(ApiError::internal)?));
    }
    let response = register_and_store(&state, &processed, &user_id, session_id.as_deref()).await?;
    Ok(Json(response))
}

async fn register_and_store(
    state: &AppState,
    processed: &ProcessedDocument,
    user_id: &str,
    session_id: Option<&str>,
) -> Result<serde_json::Value, ApiError> {
    let record = state
        .registry
        .register_document(processed, user_id, session_id);

    let stored = state
        .retrieval
        .store(
            &processed.chunks,
            user_id,
            &processed.document_type,
            record.session_id.as_deref(),
        )
        .await?;

    Ok(json!({
        "status": "success",
        "document_id": record.document_id,
        "filename": record.filename,
        "document_type": stored.document_type,
        "chunks_processed": stored.vectors_stored,
        "session_id": stored.session_id,
    }))
}

pub async fn embed(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<EmbedRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = tenant(&headers, &state);
    let record = state
        .registry
        .get_document(&user_id, &payload.document_id)
        .ok_or_else(|| ApiError::NotFound("Document not found".to_string()))?;
    let chunks = state
        .registry
        .document_chunks(&user_id, &payload.document_id)
        .ok_or_else(|| ApiError::NotFound("Document chunks not found".to_string()))?;

    let requested = payload.document_type.trim();
    let document_type = if requested.is_empty() || requested == UNKNOWN_DOCUMENT_TYPE {
        record.document_type.as_str()
    } else {
        requested
    };

    let session_id = payload
        .session_id
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .or(record.session_id.as_deref());
    let stored = state
        .retrieval
        .store(&chunks, &user_id, document_type, session_id)
        .await?;

    Ok(Json(json!({
        "document_id": stored.document_id,
        "status": "success",
        "chunks_processed": stored.vectors_stored,
        "vectors_stored": stored.vectors_stored,
        "message": format!(
            "Embeddings generated successfully for document type: {}",
            stored.document_type
        ),
    })))
}

/// Resolve a search payload into a scoped request.
///
/// When a document is named, its recorded type replaces the requested one.
fn search_request(
    state: &AppState,
    user_id: String,
    payload: SearchQuery,
    default_top_k: Option<usize>,
) -> SearchRequest {
    let document_id = payload.document_id.filter(|id| !id.trim().is_empty());

    let document_type = match document_id.as_deref() {
        Some(id) => state
            .registry
            .get_document(&user_id, id)
            .map(|doc| doc.document_type)
            .unwrap_or_else(unknown_document_type),
        None => payload.document_type,
    };

    let mut request = SearchRequest::new(payload.question, user_id).document_type(document_type);
    if let Some(top_k) = payload.top_k.or(default_top_k) {
        request = request.top_k(top_k);
    }
    if let Some(document_id) = document_id {
        request = request.document(document_id);
    }
    if let Some(session_id) = payload.session_id {
        request = request.session(session_id);
    }
    request
}

/// Ranked chunks for a question.
pub async fn search(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = tenant(&headers, &state);
    let request = search_request(&state, user_id, payload, None);

    let results = state.retrieval.search(&request).await?;
    Ok(Json(json!({
        "question": request.query,
        "document_id": request.document_id,
        "document_type": request.document_type,
        "total": results.len(),
        "results": results,
    })))
}

/// Answer a question from the caller's documents.
///
/// Scoring uses the resolved document type; when none was given, the type of
/// the best-ranked chunk.
pub async fn query(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = tenant(&headers, &state);
    let request = search_request(
        &state,
        user_id,
        payload,
        Some(state.settings.answer.context_top_k),
    );
    let results = state.retrieval.search(&request).await?;

    let requested_type = request
        .document_type
        .as_deref()
        .filter(|t| *t != UNKNOWN_DOCUMENT_TYPE);
    let document_type = requested_type
        .or_else(|| results.first().map(|hit| hit.document_type.as_str()))
        .unwrap_or(UNKNOWN_DOCUMENT_TYPE);

    let answer = state
        .answers
        .answer(&request.query, &results, document_type)
        .await;
    let quality = AnswerQuality::evaluate(&answer.answer, answer.confidence, &answer.matched_clauses);

    tracing::info!(
        source = ?answer.source,
        score = answer.score_details.score,
        "Answered question over {} chunks",
        results.len()
    );
    Ok(Json(json!({
        "question": request.query,
        "document_id": request.document_id,
        "answer": answer.answer,
        "justification": answer.justification,
        "matched_clauses": answer.matched_clauses,
        "score": answer.score_details.score,
        "score_details": answer.score_details,
        "confidence": answer.confidence,
        "source": answer.source,
        "quality": quality,
    })))
}

pub async fn list_documents(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = tenant(&headers, &state);
    let session_id = query.session_id.as_deref().filter(|s| !s.trim().is_empty());
    let documents = state.registry.list_documents(&user_id, session_id);
    Ok(Json(json!({
        "total": documents.len(),
        "documents": documents,
    })))
}

/// Remove a document's vectors, then its registry entry.
pub async fn delete_document(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(document_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = tenant(&headers, &state);
    let record = state
        .registry
        .get_document(&user_id, &document_id)
        .ok_or_else(|| ApiError::NotFound("Document not found".to_string()))?;

    let result = state
        .retrieval
        .delete_document(&document_id, &user_id, record.session_id.as_deref())
        .await?;
    state.registry.remove_document(&user_id, &document_id);

    tracing::info!(
        "Document {} deleted ({} vectors)",
        document_id,
        result.vectors_deleted
    );
    Ok(Json(json!({
        "message": "Document deleted successfully",
        "document_id": document_id,
        "vectors_deleted": result.vectors_deleted,
    })))
}
