use std::io::{Cursor, Write};
use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Json, Router};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use docqa_backend::core::config::{AppConfig, AppPaths, ConfigService};
use docqa_backend::embedding::EmbeddingProvider;
use docqa_backend::index::{LocalIndex, VectorIndex};
use docqa_backend::server::router::router;
use docqa_backend::state::AppState;

const DIMENSION: usize = 8;

struct TestApp {
    base_url: String,
    index: Option<Arc<LocalIndex>>,
    _tmp: TempDir,
}

async fn spawn_app(with_index: bool) -> TestApp {
    spawn_app_with(with_index, |_| {}).await
}

async fn spawn_app_with(with_index: bool, configure: impl FnOnce(&mut AppConfig)) -> TestApp {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let paths = AppPaths::with_dirs(tmp.path().to_path_buf(), tmp.path().join("data"));
    let config = ConfigService::new(Arc::new(paths));

    let mut settings = AppConfig::default();
    settings.retrieval.dimension = DIMENSION;
    settings.embedding.api_key = Some("secret-embedding-key".to_string());
    configure(&mut settings);

    let local = with_index.then(|| Arc::new(LocalIndex::new(DIMENSION)));
    let index = local.clone().map(|index| index as Arc<dyn VectorIndex>);
    let embedder = Arc::new(EmbeddingProvider::placeholder_only(
        DIMENSION,
        &settings.embedding,
    ));
    let state = AppState::assemble(config, settings, index, embedder);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().unwrap();
    let app = router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        base_url: format!("http://{}", addr),
        index: local,
        _tmp: tmp,
    }
}

fn client() -> Client {
    Client::new()
}

async fn upload_and_embed(app: &TestApp, user: &str, filename: &str, content: &str, session: Option<&str>) -> Value {
    let res = client()
        .post(format!("{}/documents/upload-and-embed", app.base_url))
        .header("X-User-Id", user)
        .json(&json!({"filename": filename, "content": content, "session_id": session}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    res.json().await.unwrap()
}

async fn search(app: &TestApp, user: &str, body: Value) -> Value {
    let res = client()
        .post(format!("{}/documents/search", app.base_url))
        .header("X-User-Id", user)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    res.json().await.unwrap()
}

#[tokio::test]
async fn health_reports_backends() {
    let app = spawn_app(true).await;
    let res = client()
        .get(format!("{}/health", app.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["vector_index"], "local");
    assert_eq!(body["embedding"]["mode"], "placeholder");
    assert_eq!(body["embedding"]["dimension"], DIMENSION);
    assert_eq!(body["answer_backend"], "extractive");
}

#[tokio::test]
async fn config_is_redacted() {
    let app = spawn_app(true).await;
    let body: Value = client()
        .get(format!("{}/config", app.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["embedding"]["api_key"], "****");
    assert_eq!(body["retrieval"]["dimension"], DIMENSION);
    assert!(!body.to_string().contains("secret-embedding-key"));
}

#[tokio::test]
async fn session_lifecycle_over_http() {
    let app = spawn_app(true).await;
    let index = app.index.clone().unwrap();

    let res = client()
        .post(format!("{}/documents/session/create", app.base_url))
        .header("X-User-Id", "U")
        .json(&json!({"session_id": "S1", "description": "claims"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let text = "First paragraph.\n\nSecond paragraph.\n\nThird paragraph.";
    let stored = upload_and_embed(&app, "U", "notes.txt", text, Some("S1")).await;
    assert_eq!(stored["status"], "success");
    assert_eq!(stored["session_id"], "S1");
    let document_id = stored["document_id"].as_str().unwrap().to_string();
    let stored_chunks = stored["chunks_processed"].as_u64().unwrap() as usize;
    assert_eq!(index.len().await, stored_chunks);

    let hits = search(&app, "U", json!({"question": "paragraph", "session_id": "S1"})).await;
    assert_eq!(hits["total"], stored_chunks);
    assert_eq!(hits["results"][0]["document_id"], document_id.as_str());

    let listed: Value = client()
        .get(format!("{}/documents/list?session_id=S1", app.base_url))
        .header("X-User-Id", "U")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed["total"], 1);

    let res = client()
        .delete(format!("{}/documents/session/S1", app.base_url))
        .header("X-User-Id", "U")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["vectors_deleted"], stored_chunks);
    assert!(index.is_empty().await);

    let res = client()
        .delete(format!("{}/documents/session/S1", app.base_url))
        .header("X-User-Id", "U")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn tenant_header_isolates_results() {
    let app = spawn_app(true).await;

    upload_and_embed(&app, "alice", "a.txt", "alice's private note", None).await;
    upload_and_embed(&app, "bob", "b.txt", "bob's private note", None).await;

    let alice = search(&app, "alice", json!({"question": "note", "top_k": 10})).await;
    assert_eq!(alice["total"], 1);
    assert_eq!(alice["results"][0]["text"], "alice's private note");

    // no header means the default user, who owns nothing
    let res = client()
        .post(format!("{}/documents/search", app.base_url))
        .json(&json!({"question": "note"}))
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn documents_are_owned_by_their_uploader() {
    let app = spawn_app(true).await;
    let index = app.index.clone().unwrap();

    let stored = upload_and_embed(&app, "alice", "notes.txt", "alice secret payroll numbers 12345", None).await;
    let document_id = stored["document_id"].as_str().unwrap().to_string();

    let res = client()
        .post(format!("{}/documents/embed", app.base_url))
        .header("X-User-Id", "bob")
        .json(&json!({"document_id": document_id}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let hits = search(&app, "bob", json!({"question": "payroll", "top_k": 10})).await;
    assert_eq!(hits["total"], 0);
    let hits = search(&app, "bob", json!({"question": "payroll", "document_id": document_id})).await;
    assert_eq!(hits["total"], 0);

    let listed: Value = client()
        .get(format!("{}/documents/list", app.base_url))
        .header("X-User-Id", "bob")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed["total"], 0);

    let res = client()
        .delete(format!("{}/documents/{}", app.base_url, document_id))
        .header("X-User-Id", "bob")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(index.len().await, 1);

    let res = client()
        .delete(format!("{}/documents/{}", app.base_url, document_id))
        .header("X-User-Id", "alice")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["vectors_deleted"], 1);
    assert!(index.is_empty().await);
}

#[tokio::test]
async fn sessions_are_per_tenant() {
    let app = spawn_app(true).await;

    for user in ["alice", "bob"] {
        let res = client()
            .post(format!("{}/documents/session/create", app.base_url))
            .header("X-User-Id", user)
            .json(&json!({"session_id": "S1"}))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
    upload_and_embed(&app, "alice", "a.txt", "alice session text", Some("S1")).await;

    let res = client()
        .delete(format!("{}/documents/session/S1", app.base_url))
        .header("X-User-Id", "bob")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["vectors_deleted"], 0);

    let hits = search(&app, "alice", json!({"question": "text", "session_id": "S1"})).await;
    assert_eq!(hits["total"], 1);

    let res = client()
        .delete(format!("{}/documents/session/S1", app.base_url))
        .header("X-User-Id", "mallory")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn upload_then_embed_and_delete_document() {
    let app = spawn_app(true).await;
    let index = app.index.clone().unwrap();

    let res = client()
        .post(format!("{}/documents/upload", app.base_url))
        .json(&json!({
            "filename": "policy_terms.md",
            "content": "Coverage applies to the insured property."
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let record: Value = res.json().await.unwrap();
    assert_eq!(record["document_type"], "Policy Wordings");
    let document_id = record["document_id"].as_str().unwrap().to_string();
    assert!(index.is_empty().await);

    let res = client()
        .post(format!("{}/documents/embed", app.base_url))
        .json(&json!({"document_id": document_id}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["vectors_stored"], 1);
    assert!(body["message"].as_str().unwrap().contains("Policy Wordings"));

    // the stored type wins when a document is named
    let hits = search(
        &app,
        "default_user",
        json!({"question": "coverage", "document_id": document_id, "document_type": "Legal Documents"}),
    )
    .await;
    assert_eq!(hits["total"], 1);
    assert_eq!(hits["document_type"], "Policy Wordings");

    let res = client()
        .delete(format!("{}/documents/{}", app.base_url, document_id))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(index.is_empty().await);

    let res = client()
        .post(format!("{}/documents/embed", app.base_url))
        .json(&json!({"document_id": document_id}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bad_requests_are_distinguishable() {
    let app = spawn_app(true).await;

    let res = client()
        .post(format!("{}/documents/upload", app.base_url))
        .json(&json!({"filename": "scan.pdf", "content": "%PDF"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["kind"], "bad_request");
    assert_eq!(body["retryable"], false);

    let res = client()
        .post(format!("{}/documents/search", app.base_url))
        .json(&json!({"question": "q", "top_k": 0}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_index_is_service_unavailable() {
    let app = spawn_app(false).await;

    let health: Value = client()
        .get(format!("{}/health", app.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "degraded");
    assert!(health["vector_index"].is_null());

    let res = client()
        .post(format!("{}/documents/upload-and-embed", app.base_url))
        .json(&json!({"filename": "a.txt", "content": "hello"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["kind"], "index_unavailable");
}

/// Serve `router` on an ephemeral port and return its base URL.
async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn query(app: &TestApp, user: &str, body: Value) -> Value {
    let res = client()
        .post(format!("{}/documents/query", app.base_url))
        .header("X-User-Id", user)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    res.json().await.unwrap()
}

const POLICY: &str = "Premiums are payable monthly. The grace period for late premiums is thirty days.";

#[tokio::test]
async fn query_answers_from_the_best_chunk() {
    let app = spawn_app(true).await;
    let uploaded = upload_and_embed(&app, "alice", "policy.txt", POLICY, None).await;
    let document_id = uploaded["document_id"].as_str().unwrap();

    let body = query(
        &app,
        "alice",
        json!({"question": "How long is the grace period?", "document_id": document_id}),
    )
    .await;

    assert_eq!(body["source"], "extractive");
    assert_eq!(
        body["answer"],
        "The grace period for late premiums is thirty days."
    );
    assert_eq!(body["matched_clauses"].as_array().unwrap().len(), 1);
    let details = &body["score_details"];
    assert_eq!(details["question_weight"], 2.0);
    let expected = details["question_weight"].as_f64().unwrap() * details["document_weight"].as_f64().unwrap();
    assert!((body["score"].as_f64().unwrap() - expected).abs() < 1e-6);
    assert!(body["quality"]["quality_score"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn query_without_context_scores_zero() {
    let app = spawn_app(true).await;
    upload_and_embed(&app, "alice", "policy.txt", POLICY, None).await;

    // Another tenant has nothing to answer from.
    let body = query(&app, "bob", json!({"question": "How long is the grace period?"})).await;

    assert_eq!(body["source"], "no_context");
    assert_eq!(body["score"], 0.0);
    assert_eq!(body["confidence"], 0.0);
    assert_eq!(body["score_details"]["document_weight"], 2.0);
    assert!(body["matched_clauses"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn query_uses_the_configured_model() {
    let model = Router::new().route(
        "/models/:model",
        post(|| async {
            Json(json!({
                "candidates": [{ "content": { "parts": [{
                    "text": "{\"answer\": \"Thirty days.\", \"justification\": \"Grace clause\", \"matched_clauses\": [\"grace period\"], \"confidence\": 0.9}"
                }] } }]
            }))
        }),
    );
    let endpoint = serve(model).await;
    let app = spawn_app_with(true, |settings| {
        settings.answer.api_key = Some("answer-key".to_string());
        settings.answer.endpoint = endpoint;
    })
    .await;
    upload_and_embed(&app, "alice", "policy.txt", POLICY, None).await;

    let body = query(&app, "alice", json!({"question": "Grace period?"})).await;

    assert_eq!(body["source"], "model");
    assert_eq!(body["answer"], "Thirty days.");
    assert_eq!(body["matched_clauses"], json!(["grace period"]));
    assert!((body["confidence"].as_f64().unwrap() - 0.9).abs() < 1e-6);
}

#[tokio::test]
async fn failing_model_falls_back_to_extraction() {
    let model = Router::new().route(
        "/models/:model",
        post(|| async { (axum::http::StatusCode::TOO_MANY_REQUESTS, "quota") }),
    );
    let endpoint = serve(model).await;
    let app = spawn_app_with(true, |settings| {
        settings.answer.api_key = Some("answer-key".to_string());
        settings.answer.endpoint = endpoint;
    })
    .await;
    upload_and_embed(&app, "alice", "policy.txt", POLICY, None).await;

    let body = query(&app, "alice", json!({"question": "How long is the grace period?"})).await;

    assert_eq!(body["source"], "extractive");
    assert_eq!(
        body["answer"],
        "The grace period for late premiums is thirty days."
    );
}

fn docx(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    let xml = format!(
        "<?xml version=\"1.0\"?><w:document><w:body>{}</w:body></w:document>",
        body
    );
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("word/document.xml", SimpleFileOptions::default())
        .unwrap();
    writer.write_all(xml.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

#[tokio::test]
async fn docx_upload_is_indexed() {
    let app = spawn_app(true).await;
    let index = app.index.clone().unwrap();

    let form = Form::new()
        .part(
            "file",
            Part::bytes(docx(&["Termination requires notice.", "Notice is sixty days."]))
                .file_name("contract.docx"),
        )
        .text("session_id", "S1");
    let res = client()
        .post(format!("{}/documents/upload-file", app.base_url))
        .header("X-User-Id", "alice")
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["filename"], "contract.docx");
    assert_eq!(body["session_id"], "S1");
    assert!(index.len().await >= 1);

    let found = search(&app, "alice", json!({"question": "notice", "session_id": "S1"})).await;
    let text = found["results"][0]["text"].as_str().unwrap();
    assert!(text.contains("Notice is sixty days."));
}

#[tokio::test]
async fn file_upload_can_skip_embedding() {
    let app = spawn_app(true).await;
    let index = app.index.clone().unwrap();

    let form = Form::new()
        .part(
            "file",
            Part::bytes(POLICY.as_bytes().to_vec()).file_name("policy.txt"),
        )
        .text("embed", "false");
    let res = client()
        .post(format!("{}/documents/upload-file", app.base_url))
        .header("X-User-Id", "alice")
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["filename"], "policy.txt");
    assert_eq!(index.len().await, 0);

    let res = client()
        .post(format!("{}/documents/upload-file", app.base_url))
        .multipart(Form::new().text("session_id", "S1"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

async fn document_server() -> String {
    serve(Router::new().route("/files/policy.txt", get(|| async { POLICY }))).await
}

#[tokio::test]
async fn batch_run_answers_every_question_and_cleans_up() {
    let files = document_server().await;
    let app = spawn_app_with(true, |settings| {
        settings.batch.api_key = Some("team-token".to_string());
    })
    .await;
    let index = app.index.clone().unwrap();
    let payload = json!({
        "documents": format!("{}/files/policy.txt?sig=abc", files),
        "questions": ["How long is the grace period?", "When are premiums payable?"],
    });

    let res = client()
        .post(format!("{}/hackrx/run", app.base_url))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client()
        .post(format!("{}/hackrx/run", app.base_url))
        .bearer_auth("wrong")
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["kind"], "unauthorized");

    let res = client()
        .post(format!("{}/hackrx/run", app.base_url))
        .bearer_auth("team-token")
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();

    let answers = body["answers"].as_array().unwrap();
    assert_eq!(answers.len(), 2);
    assert_eq!(answers[0], "The grace period for late premiums is thirty days.");
    assert_eq!(answers[1], "Premiums are payable monthly.");
    assert_eq!(body["summary"]["total_questions"], 2);
    assert_eq!(body["summary"]["correct_answers"], 2);
    assert_eq!(index.len().await, 0);

    let health: Value = client()
        .get(format!("{}/health", app.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["sessions"], 0);
    assert_eq!(health["documents"], 0);
}

#[tokio::test]
async fn batch_run_rejects_unreachable_documents() {
    let files = document_server().await;
    let app = spawn_app(true).await;

    let res = client()
        .post(format!("{}/hackrx/run", app.base_url))
        .json(&json!({
            "documents": format!("{}/files/missing.pdf", files),
            "questions": ["Anything?"],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("Failed to get document"));
}
