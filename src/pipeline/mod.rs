//! Document ingestion: text extraction, type detection, and chunking.

mod binary;
mod chunker;
mod classify;
mod extract;
mod fetch;

pub use chunker::RecursiveChunker;
pub use classify::{detect_document_type, is_known_document_type};
pub use extract::{extract_bytes, extract_text, file_kind, FileKind};
pub use fetch::{fetch_document, FetchedDocument};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::core::config::PipelineConfig;
use crate::core::errors::ApiError;
use crate::retrieval::ChunkRecord;

#[derive(Debug, Clone, Serialize)]
pub struct ProcessedDocument {
    pub document_id: String,
    pub filename: String,
    pub file_type: String,
    pub document_type: String,
    pub chunks: Vec<ChunkRecord>,
    pub upload_time: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct DocumentPipeline {
    chunker: RecursiveChunker,
}

impl DocumentPipeline {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            chunker: RecursiveChunker::new(config.chunk_size, config.chunk_overlap),
        }
    }

    /// Process a document whose content arrived as a string.
    pub fn process(&self, filename: &str, content: &str) -> Result<ProcessedDocument, ApiError> {
        let (kind, file_type) = file_kind(filename)?;
        let text = extract_text(kind, content)?;
        self.build(filename, file_type, text)
    }

    /// Process an uploaded or downloaded file of any supported format.
    pub fn process_bytes(
        &self,
        filename: &str,
        bytes: &[u8],
    ) -> Result<ProcessedDocument, ApiError> {
        let (kind, file_type) = file_kind(filename)?;
        let text = extract_bytes(kind, bytes)?;
        self.build(filename, file_type, text)
    }

    fn build(
        &self,
        filename: &str,
        file_type: String,
        text: String,
    ) -> Result<ProcessedDocument, ApiError> {
        if text.trim().is_empty() {
            return Err(ApiError::BadRequest(format!(
                "no text could be extracted from '{}'",
                filename
            )));
        }

        let document_id = Uuid::new_v4().to_string();
        let document_type = detect_document_type(&text, filename);
        let chunks: Vec<ChunkRecord> = self
            .chunker
            .split(&text)
            .into_iter()
            .enumerate()
            .map(|(index, text)| ChunkRecord {
                document_id: document_id.clone(),
                chunk_id: index as u32,
                text,
                filename: filename.to_string(),
                document_type: document_type.clone(),
            })
            .collect();

        tracing::info!(
            document_id = %document_id,
            document_type = %document_type,
            chunks = chunks.len(),
            "Processed {}",
            filename
        );

        Ok(ProcessedDocument {
            document_id,
            filename: filename.to_string(),
            file_type,
            document_type,
            chunks,
            upload_time: Utc::now(),
        })
    }
}
