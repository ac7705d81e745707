//! In-process vector index.
//!
//! Brute-force cosine scan over a `HashMap` guarded by a tokio `RwLock`.
//! Meant for development and small deployments where no hosted index is
//! configured; filtering and ranking match `PineconeIndex`.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::math::{cosine_with_norm, l2_norm};
use super::{
    rank_matches, IndexError, Metadata, MetadataFilter, QueryMatch, VectorEntry, VectorIndex,
};

struct StoredVector {
    embedding: Vec<f32>,
    norm: f32,
    metadata: Metadata,
}

pub struct LocalIndex {
    dimension: usize,
    entries: RwLock<HashMap<String, StoredVector>>,
}

impl LocalIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.entries.read().await.contains_key(id)
    }
}

#[async_trait]
impl VectorIndex for LocalIndex {
    fn name(&self) -> &str {
        "local"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn upsert(&self, entries: Vec<VectorEntry>) -> Result<(), IndexError> {
        if entries.is_empty() {
            return Ok(());
        }

        // Validate the whole batch before touching the map so a bad entry
        // leaves nothing behind.
        for entry in &entries {
            IndexError::check_dimension(self.dimension, entry.embedding.len())?;
        }

        let prepared: Vec<(String, StoredVector)> = entries
            .into_iter()
            .map(|entry| {
                let norm = l2_norm(&entry.embedding);
                (
                    entry.id,
                    StoredVector {
                        embedding: entry.embedding,
                        norm,
                        metadata: entry.metadata,
                    },
                )
            })
            .collect();

        let count = prepared.len();
        let mut map = self.entries.write().await;
        map.extend(prepared);
        tracing::debug!(count, total = map.len(), "local index upsert");
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<QueryMatch>, IndexError> {
        if top_k == 0 {
            return Err(IndexError::InvalidTopK);
        }
        IndexError::check_dimension(self.dimension, vector.len())?;

        let query_norm = l2_norm(vector);
        let map = self.entries.read().await;

        let mut matches: Vec<QueryMatch> = map
            .iter()
            .filter(|(_, stored)| filter.matches(&stored.metadata))
            .map(|(id, stored)| {
                let score = if stored.norm == 0.0 {
                    0.0
                } else {
                    cosine_with_norm(vector, query_norm, &stored.embedding)
                };
                QueryMatch {
                    id: id.clone(),
                    score,
                    metadata: stored.metadata.clone(),
                }
            })
            .collect();
        drop(map);

        rank_matches(&mut matches);
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn delete(&self, ids: &[String]) -> Result<(), IndexError> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut map = self.entries.write().await;
        let removed = ids.iter().filter(|id| map.remove(id.as_str()).is_some()).count();
        tracing::debug!(requested = ids.len(), removed, "local index delete");
        Ok(())
    }
}
