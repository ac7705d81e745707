use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::server::handlers::{batch, config, documents, health, sessions};
use crate::state::AppState;

/// Creates the application router.
///
/// Every route acts for the tenant named in `X-User-Id`, or the configured
/// default user when the header is absent.
pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.settings.pipeline.max_upload_bytes;
    Router::new()
        .route("/health", get(health::health))
        .route("/config", get(config::get_config))
        .route("/documents/session/create", post(sessions::create_session))
        .route(
            "/documents/session/:session_id",
            delete(sessions::delete_session),
        )
        .route("/documents/upload", post(documents::upload))
        .route(
            "/documents/upload-and-embed",
            post(documents::upload_and_embed),
        )
        .route("/documents/upload-file", post(documents::upload_file))
        .route("/documents/embed", post(documents::embed))
        .route("/documents/search", post(documents::search))
        .route("/documents/query", post(documents::query))
        .route("/documents/list", get(documents::list_documents))
        .route(
            "/documents/:document_id",
            delete(documents::delete_document),
        )
        .route("/hackrx/run", post(batch::run))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
