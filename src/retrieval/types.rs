use serde::{Deserialize, Serialize};

use super::scope::UNKNOWN_DOCUMENT_TYPE;

fn unknown_document_type() -> String {
    UNKNOWN_DOCUMENT_TYPE.to_string()
}

/// A chunk of extracted document text, as produced by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub document_id: String,
    /// Position of the chunk in the source text, dense from 0.
    pub chunk_id: u32,
    pub text: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default = "unknown_document_type")]
    pub document_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreResult {
    pub vectors_stored: usize,
    pub document_id: String,
    pub document_type: String,
    pub session_id: Option<String>,
}

/// Parameters of a scoped similarity search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub user_id: String,
    /// Falls back to the configured default when absent.
    pub top_k: Option<usize>,
    pub document_type: Option<String>,
    pub document_id: Option<String>,
    pub session_id: Option<String>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn document_type(mut self, document_type: impl Into<String>) -> Self {
        self.document_type = Some(document_type.into());
        self
    }

    pub fn document(mut self, document_id: impl Into<String>) -> Self {
        self.document_id = Some(document_id.into());
        self
    }

    pub fn session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkSearchResult {
    pub id: String,
    pub text: String,
    pub document_id: String,
    pub chunk_id: u32,
    pub document_type: String,
    pub session_id: Option<String>,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResult {
    pub success: bool,
    pub vectors_deleted: usize,
}
