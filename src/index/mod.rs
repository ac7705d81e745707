//! Vector index abstraction.
//!
//! This module provides:
//! - `VectorIndex`: the upsert / query / delete contract every backend honors
//! - `LocalIndex`: in-process linear-scan cosine store
//! - `PineconeIndex`: REST client for a hosted Pinecone index
//!
//! The backend is picked once at startup and shared behind
//! `Arc<dyn VectorIndex>`; nothing downstream inspects which one it got.

mod filter;
mod local;
pub mod math;
mod remote;

pub use filter::MetadataFilter;
pub use local::LocalIndex;
pub use remote::PineconeIndex;

use std::cmp::Ordering;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Metadata attached to a stored vector.
pub type Metadata = Map<String, Value>;

/// The persisted unit of the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorEntry {
    pub id: String,
    #[serde(rename = "values")]
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl VectorEntry {
    pub fn new(id: impl Into<String>, embedding: Vec<f32>, metadata: Metadata) -> Self {
        Self {
            id: id.into(),
            embedding,
            metadata,
        }
    }
}

/// One ranked hit returned by `VectorIndex::query`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMatch {
    pub id: String,
    /// Cosine similarity in [-1, 1]; 0.0 when either vector has zero norm.
    pub score: f32,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Errors reported by index backends.
///
/// Backend-shaped; the retrieval layer maps them to `ApiError`.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("top_k must be a positive integer")]
    InvalidTopK,
    #[error("invalid metadata filter: {0}")]
    InvalidFilter(String),
    #[error("index request timed out: {0}")]
    Timeout(String),
    #[error("index transport error: {0}")]
    Transport(String),
    #[error("index returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode index response: {0}")]
    Decode(String),
}

impl IndexError {
    pub(crate) fn check_dimension(expected: usize, actual: usize) -> Result<(), IndexError> {
        if expected == actual {
            Ok(())
        } else {
            Err(IndexError::DimensionMismatch { expected, actual })
        }
    }
}

/// Storage and filtered similarity search over embedded chunks.
///
/// Implementations must:
/// - treat `upsert` as insert-or-overwrite keyed by `VectorEntry::id`
/// - rank `query` results by descending cosine similarity, returning at most `top_k`
/// - exclude every candidate that fails `filter` before ranking
/// - treat deletion of unknown ids as a no-op
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Backend name used in logs and health output.
    fn name(&self) -> &str;

    /// Fixed embedding dimension of this index.
    fn dimension(&self) -> usize;

    async fn upsert(&self, entries: Vec<VectorEntry>) -> Result<(), IndexError>;

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<QueryMatch>, IndexError>;

    async fn delete(&self, ids: &[String]) -> Result<(), IndexError>;
}

/// Descending score, ties broken by ascending id so repeated calls agree.
pub(crate) fn rank_matches(matches: &mut [QueryMatch]) {
    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str, score: f32) -> QueryMatch {
        QueryMatch {
            id: id.to_string(),
            score,
            metadata: Metadata::new(),
        }
    }

    #[test]
    fn ranking_is_descending_with_id_tie_break() {
        let mut matches = vec![hit("b", 0.5), hit("c", 0.9), hit("a", 0.5)];
        rank_matches(&mut matches);

        let ids: Vec<&str> = matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn entry_serializes_embedding_as_values() {
        let entry = VectorEntry::new("u_d_0", vec![1.0, 2.0], Metadata::new());
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["values"], serde_json::json!([1.0, 2.0]));
    }
}
