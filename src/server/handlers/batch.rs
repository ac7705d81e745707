use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::answer::BatchSummary;
use crate::core::errors::ApiError;
use crate::pipeline::{fetch_document, ProcessedDocument};
use crate::retrieval::SearchRequest;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    /// URL of the document to answer from.
    pub documents: String,
    pub questions: Vec<String>,
}

/// Bearer check, enforced only when a batch key is configured.
fn authorize(headers: &HeaderMap, state: &AppState) -> Result<(), ApiError> {
    let Some(expected) = state.settings.batch.api_key() else {
        return Ok(());
    };
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim);
    match presented {
        Some(token) if token == expected => Ok(()),
        Some(_) => Err(ApiError::Unauthorized("invalid API key".to_string())),
        None => Err(ApiError::Unauthorized("missing bearer token".to_string())),
    }
}

/// Download one document, index it in a throwaway session, answer every
/// question against it, then drop the session.
///
/// A failure on one question becomes that question's answer; the rest still
/// run.
pub async fn run(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<BatchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&headers, &state)?;
    if payload.questions.is_empty() {
        return Err(ApiError::BadRequest("no questions supplied".to_string()));
    }

    let fetched = fetch_document(
        &state.http,
        payload.documents.trim(),
        state.settings.pipeline.max_upload_bytes,
    )
    .await?;
    let processed = state
        .pipeline
        .process_bytes(&fetched.filename, &fetched.bytes)?;

    let user_id = state.settings.batch.user_id.clone();
    let session_id = format!("hackrx_{}", &Uuid::new_v4().simple().to_string()[..8]);
    state.registry.create_session(
        &user_id,
        &session_id,
        Some(format!("Batch run over {}", fetched.filename)),
    );
    state
        .registry
        .register_document(&processed, &user_id, Some(&session_id));

    let outcome = answer_all(&state, &payload.questions, &user_id, &session_id, &processed).await;

    match state.retrieval.delete_session(&session_id, &user_id).await {
        Ok(result) => tracing::debug!(
            "Batch session {} cleaned up ({} vectors)",
            session_id,
            result.vectors_deleted
        ),
        Err(err) => tracing::warn!("Failed to clean up batch session {}: {}", session_id, err),
    }
    state.registry.remove_document(&user_id, &processed.document_id);
    state.registry.remove_session(&user_id, &session_id);

    let (answers, scores) = outcome?;
    let summary = BatchSummary::from_scores(&scores);
    tracing::info!(
        questions = summary.total_questions,
        answered = summary.correct_answers,
        "Batch run over {} finished",
        fetched.filename
    );
    Ok(Json(json!({
        "answers": answers,
        "summary": summary,
    })))
}

async fn answer_all(
    state: &AppState,
    questions: &[String],
    user_id: &str,
    session_id: &str,
    processed: &ProcessedDocument,
) -> Result<(Vec<String>, Vec<f32>), ApiError> {
    state
        .retrieval
        .store(
            &processed.chunks,
            user_id,
            &processed.document_type,
            Some(session_id),
        )
        .await?;

    let mut answers = Vec::with_capacity(questions.len());
    let mut scores = Vec::with_capacity(questions.len());
    for question in questions {
        let request = SearchRequest::new(question.as_str(), user_id)
            .session(session_id)
            .document_type(processed.document_type.as_str())
            .top_k(state.settings.batch.top_k);
        match state.retrieval.search(&request).await {
            Ok(results) => {
                let answer = state
                    .answers
                    .answer(question, &results, &processed.document_type)
                    .await;
                scores.push(answer.score_details.score);
                answers.push(answer.answer);
            }
            Err(err) => {
                tracing::warn!("Batch question failed: {}", err);
                scores.push(0.0);
                answers.push(format!("Error: {}", err));
            }
        }
    }
    Ok((answers, scores))
}
