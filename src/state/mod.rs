use std::sync::Arc;

use reqwest::Client;

use crate::answer::AnswerSynthesizer;
use crate::core::config::{AppConfig, AppPaths, ConfigService};
use crate::embedding::EmbeddingProvider;
use crate::index::{LocalIndex, PineconeIndex, VectorIndex};
use crate::pipeline::DocumentPipeline;
use crate::registry::DocumentRegistry;
use crate::retrieval::RetrievalService;

pub mod error;

use error::InitializationError;

/// Application state shared across all routes.
///
/// The vector index backend is chosen once, in `initialize`, and never
/// swapped afterwards.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: ConfigService,
    pub settings: AppConfig,
    pub retrieval: RetrievalService,
    pub registry: DocumentRegistry,
    pub pipeline: DocumentPipeline,
    pub answers: Arc<AnswerSynthesizer>,
    /// Client for documents fetched by URL.
    pub http: Client,
}

impl AppState {
    /// Load configuration and wire the embedding provider, vector index and
    /// answer synthesizer.
    ///
    /// With no index credentials the in-memory index is used. With
    /// credentials that cannot be resolved the service still starts, but
    /// without an index.
    pub async fn initialize(config: ConfigService) -> Result<Arc<Self>, InitializationError> {
        let settings = config.load_config().map_err(InitializationError::Config)?;
        let dimension = settings.retrieval.dimension;

        let embedder = Arc::new(EmbeddingProvider::from_config(
            dimension,
            &settings.embedding,
        ));
        let index = select_index(&settings).await;

        Ok(Self::assemble(config, settings, index, embedder))
    }

    /// Build state from already-constructed parts.
    pub fn assemble(
        config: ConfigService,
        settings: AppConfig,
        index: Option<Arc<dyn VectorIndex>>,
        embedder: Arc<EmbeddingProvider>,
    ) -> Arc<Self> {
        let retrieval = RetrievalService::new(
            index,
            embedder,
            settings.retrieval.clone(),
            settings.vector_index.timeout(),
        );
        let pipeline = DocumentPipeline::new(&settings.pipeline);
        let answers = Arc::new(AnswerSynthesizer::from_config(&settings.answer));
        let http = Client::builder()
            .timeout(settings.batch.download_timeout())
            .build()
            .unwrap_or_else(|err| {
                tracing::warn!("Falling back to a default HTTP client: {}", err);
                Client::new()
            });

        Arc::new(Self {
            paths: config.shared_paths(),
            config,
            settings,
            retrieval,
            registry: DocumentRegistry::new(),
            pipeline,
            answers,
            http,
        })
    }
}

async fn select_index(settings: &AppConfig) -> Option<Arc<dyn VectorIndex>> {
    let dimension = settings.retrieval.dimension;
    if !settings.vector_index.has_remote_credentials() {
        tracing::info!("No vector index credentials; using the in-memory index");
        return Some(Arc::new(LocalIndex::new(dimension)));
    }

    match PineconeIndex::connect(&settings.vector_index, dimension).await {
        Ok(index) => Some(Arc::new(index)),
        Err(err) => {
            tracing::error!(
                "Failed to connect to vector index '{}': {}; running without an index",
                settings.vector_index.index_name,
                err
            );
            None
        }
    }
}
