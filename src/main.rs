use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;

use docqa_backend::core::config::{AppPaths, ConfigService};
use docqa_backend::core::logging;
use docqa_backend::server::router::router;
use docqa_backend::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let paths = Arc::new(AppPaths::new());
    logging::init(&paths);

    let config = ConfigService::new(paths.clone());
    let state = AppState::initialize(config).await?;

    let bind_addr = format!(
        "{}:{}",
        state.settings.server.host, state.settings.server.port
    );
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;
    tracing::info!(
        "Listening on {} (vector index: {})",
        addr,
        state.retrieval.index_name().unwrap_or("none")
    );

    axum::serve(listener, router(state)).await.context("Server error")?;

    Ok(())
}
