use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::scope::{
    present, vector_id, IsolationScope, CHUNK_ID_KEY, DOCUMENT_ID_KEY, DOCUMENT_TYPE_KEY,
    FILENAME_KEY, SESSION_ID_KEY, TEXT_KEY, UNKNOWN_DOCUMENT_TYPE, USER_ID_KEY,
};
use super::types::{ChunkRecord, ChunkSearchResult, DeleteResult, SearchRequest, StoreResult};
use crate::core::config::RetrievalConfig;
use crate::core::errors::ApiError;
use crate::embedding::EmbeddingProvider;
use crate::index::{IndexError, Metadata, MetadataFilter, QueryMatch, VectorEntry, VectorIndex};

/// Scoped store / search / delete over the shared vector index.
///
/// Every read and delete runs under a filter that includes `user_id`, and
/// results are re-checked against that filter before they leave this type.
#[derive(Clone)]
pub struct RetrievalService {
    index: Option<Arc<dyn VectorIndex>>,
    embedder: Arc<EmbeddingProvider>,
    config: RetrievalConfig,
    index_timeout: Duration,
}

impl RetrievalService {
    pub fn new(
        index: Option<Arc<dyn VectorIndex>>,
        embedder: Arc<EmbeddingProvider>,
        config: RetrievalConfig,
        index_timeout: Duration,
    ) -> Self {
        if let Some(index) = &index {
            if index.dimension() != embedder.dimension() {
                tracing::warn!(
                    "Index '{}' dimension {} differs from embedding dimension {}",
                    index.name(),
                    index.dimension(),
                    embedder.dimension()
                );
            }
        }
        Self {
            index,
            embedder,
            config,
            index_timeout,
        }
    }

    pub fn index_name(&self) -> Option<&str> {
        self.index.as_deref().map(|index| index.name())
    }

    pub fn embedder(&self) -> &EmbeddingProvider {
        &self.embedder
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    fn index(&self) -> Result<&dyn VectorIndex, ApiError> {
        self.index.as_deref().ok_or(ApiError::IndexUnavailable)
    }

    pub async fn store(
        &self,
        chunks: &[ChunkRecord],
        user_id: &str,
        document_type: &str,
        session_id: Option<&str>,
    ) -> Result<StoreResult, ApiError> {
        let index = self.index()?;
        let first = chunks
            .first()
            .ok_or_else(|| ApiError::BadRequest("no chunks to store".to_string()))?;
        let document_id = first.document_id.clone();
        if let Some(stray) = chunks.iter().find(|c| c.document_id != document_id) {
            return Err(ApiError::BadRequest(format!(
                "chunks span multiple documents ({} and {})",
                document_id, stray.document_id
            )));
        }
        if let Some(empty) = chunks.iter().find(|c| c.text.trim().is_empty()) {
            return Err(ApiError::BadRequest(format!(
                "chunk {} of {} has no text",
                empty.chunk_id, document_id
            )));
        }

        let session_id = present(session_id);
        let document_type = present(Some(document_type)).unwrap_or(UNKNOWN_DOCUMENT_TYPE);

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await?;

        let entries: Vec<VectorEntry> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| {
                let mut metadata = Metadata::new();
                metadata.insert(USER_ID_KEY.to_string(), Value::from(user_id));
                metadata.insert(DOCUMENT_ID_KEY.to_string(), Value::from(chunk.document_id.as_str()));
                metadata.insert(CHUNK_ID_KEY.to_string(), Value::from(chunk.chunk_id));
                metadata.insert(TEXT_KEY.to_string(), Value::from(chunk.text.as_str()));
                metadata.insert(DOCUMENT_TYPE_KEY.to_string(), Value::from(document_type));
                metadata.insert(FILENAME_KEY.to_string(), Value::from(chunk.filename.as_str()));
                if let Some(session_id) = session_id {
                    metadata.insert(SESSION_ID_KEY.to_string(), Value::from(session_id));
                }

                VectorEntry::new(
                    vector_id(user_id, session_id, &chunk.document_id, chunk.chunk_id),
                    embedding,
                    metadata,
                )
            })
            .collect();

        let vectors_stored = entries.len();
        self.bounded("upsert", index.upsert(entries)).await?;

        tracing::debug!(
            document_id = %document_id,
            session_id = ?session_id,
            vectors_stored,
            "stored document chunks"
        );

        Ok(StoreResult {
            vectors_stored,
            document_id,
            document_type: document_type.to_string(),
            session_id: session_id.map(str::to_string),
        })
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<ChunkSearchResult>, ApiError> {
        let index = self.index()?;
        if request.query.trim().is_empty() {
            return Err(ApiError::BadRequest("query text is empty".to_string()));
        }
        let top_k = self.resolve_top_k(request.top_k)?;

        let scope = IsolationScope::resolve(
            &request.user_id,
            request.session_id.as_deref(),
            request.document_id.as_deref(),
            request.document_type.as_deref(),
        );
        let filter = scope.filter();

        let vector = self.embedder.embed_one(&request.query).await?;
        let matches = self
            .bounded("query", index.query(&vector, top_k, &filter))
            .await?;
        let matches = retain_in_scope(matches, &filter);

        tracing::debug!(
            scope = ?scope.narrowing(),
            document_type = ?scope.document_type(),
            top_k,
            results = matches.len(),
            "search"
        );

        Ok(matches.into_iter().map(to_search_result).collect())
    }

    pub async fn delete_document(
        &self,
        document_id: &str,
        user_id: &str,
        session_id: Option<&str>,
    ) -> Result<DeleteResult, ApiError> {
        if document_id.trim().is_empty() {
            return Err(ApiError::BadRequest("document_id is empty".to_string()));
        }
        let mut filter = MetadataFilter::new()
            .eq(DOCUMENT_ID_KEY, document_id)
            .eq(USER_ID_KEY, user_id);
        if let Some(session_id) = present(session_id) {
            filter = filter.eq(SESSION_ID_KEY, session_id);
        }
        self.delete_matching(&filter).await
    }

    pub async fn delete_session(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<DeleteResult, ApiError> {
        if session_id.trim().is_empty() {
            return Err(ApiError::BadRequest("session_id is empty".to_string()));
        }
        let filter = MetadataFilter::new()
            .eq(SESSION_ID_KEY, session_id)
            .eq(USER_ID_KEY, user_id);
        self.delete_matching(&filter).await
    }

    /// Enumerate by query, then delete by id, in passes of at most
    /// `delete_scan_limit` until a pass comes back short. Not transactional:
    /// a store racing with this may or may not survive.
    async fn delete_matching(&self, filter: &MetadataFilter) -> Result<DeleteResult, ApiError> {
        let index = self.index()?;
        let limit = self.config.delete_scan_limit.max(1);
        let scan_vector = self.embedder.placeholder_vector();
        let mut deleted: HashSet<String> = HashSet::new();
        let mut passes = 0usize;

        loop {
            passes += 1;
            let matches = self
                .bounded("query", index.query(&scan_vector, limit, filter))
                .await?;
            let returned = matches.len();
            let ids: Vec<String> = retain_in_scope(matches, filter)
                .into_iter()
                .map(|m| m.id)
                .filter(|id| !deleted.contains(id))
                .collect();

            if ids.is_empty() {
                break;
            }
            self.bounded("delete", index.delete(&ids)).await?;
            deleted.extend(ids);

            if returned < limit {
                break;
            }
        }

        tracing::debug!(deleted = deleted.len(), passes, "deleted vectors by scope");
        Ok(DeleteResult {
            success: true,
            vectors_deleted: deleted.len(),
        })
    }

    fn resolve_top_k(&self, requested: Option<usize>) -> Result<usize, ApiError> {
        let top_k = requested.unwrap_or(self.config.default_top_k);
        if top_k == 0 {
            return Err(ApiError::BadRequest("top_k must be positive".to_string()));
        }
        if top_k > self.config.max_top_k {
            return Err(ApiError::BadRequest(format!(
                "top_k must not exceed {}",
                self.config.max_top_k
            )));
        }
        Ok(top_k)
    }

    async fn bounded<T, F>(&self, operation: &str, call: F) -> Result<T, ApiError>
    where
        F: Future<Output = Result<T, IndexError>>,
    {
        match tokio::time::timeout(self.index_timeout, call).await {
            Ok(result) => result.map_err(translate_index_error),
            Err(_) => Err(ApiError::BackendTimeout(format!(
                "index {} did not complete within {:?}",
                operation, self.index_timeout
            ))),
        }
    }
}

fn translate_index_error(err: IndexError) -> ApiError {
    match err {
        IndexError::Timeout(msg) => ApiError::BackendTimeout(msg),
        IndexError::InvalidTopK | IndexError::InvalidFilter(_) => {
            ApiError::BadRequest(err.to_string())
        }
        IndexError::DimensionMismatch { .. } => ApiError::Internal(err.to_string()),
        IndexError::Transport(_) | IndexError::Status { .. } | IndexError::Decode(_) => {
            ApiError::Backend(err.to_string())
        }
    }
}

fn retain_in_scope(matches: Vec<QueryMatch>, filter: &MetadataFilter) -> Vec<QueryMatch> {
    let total = matches.len();
    let kept: Vec<QueryMatch> = matches
        .into_iter()
        .filter(|m| filter.matches(&m.metadata))
        .collect();
    if kept.len() != total {
        tracing::warn!(
            dropped = total - kept.len(),
            "Index returned matches outside the requested scope"
        );
    }
    kept
}

fn to_search_result(m: QueryMatch) -> ChunkSearchResult {
    let string_field = |key: &str| {
        m.metadata
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    let chunk_id = m
        .metadata
        .get(CHUNK_ID_KEY)
        .and_then(|v| v.as_u64().or_else(|| v.as_f64().map(|f| f as u64)))
        .unwrap_or_default() as u32;

    ChunkSearchResult {
        text: string_field(TEXT_KEY).unwrap_or_default(),
        document_id: string_field(DOCUMENT_ID_KEY).unwrap_or_default(),
        chunk_id,
        document_type: string_field(DOCUMENT_TYPE_KEY)
            .unwrap_or_else(|| UNKNOWN_DOCUMENT_TYPE.to_string()),
        session_id: string_field(SESSION_ID_KEY),
        score: m.score,
        id: m.id,
    }
}
