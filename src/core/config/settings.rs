//! Typed view of the merged configuration.
//!
//! Every section carries `#[serde(default)]` so a partial `config.yml`
//! (or none at all) still yields a complete `AppConfig`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_DIMENSION: usize = 768;
pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_USER_ID: &str = "default_user";
pub const COSINE_METRIC: &str = "cosine";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub vector_index: VectorIndexConfig,
    pub pipeline: PipelineConfig,
    pub answer: AnswerConfig,
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Embedding dimension; fixed for the lifetime of the index.
    pub dimension: usize,
    pub default_top_k: usize,
    pub max_top_k: usize,
    /// Upper bound on ids enumerated by one delete-by-scope pass.
    pub delete_scan_limit: usize,
    pub default_user_id: String,
    pub metric: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_DIMENSION,
            default_top_k: DEFAULT_TOP_K,
            max_top_k: 100,
            delete_scan_limit: 10_000,
            default_user_id: DEFAULT_USER_ID.to_string(),
            metric: COSINE_METRIC.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub timeout_ms: u64,
    /// Every component of the placeholder vector.
    pub fallback_value: f32,
    /// Surface backend failures instead of degrading to placeholder vectors.
    pub strict: bool,
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "embedding-001".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_ms: 10_000,
            fallback_value: 0.1,
            strict: false,
            batch_size: 100,
        }
    }
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn api_key(&self) -> Option<&str> {
        non_empty(self.api_key.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorIndexConfig {
    pub api_key: Option<String>,
    pub index_name: String,
    /// Data-plane host; resolved through the control plane when absent.
    pub host: Option<String>,
    pub control_plane_url: String,
    pub cloud: String,
    pub region: String,
    pub namespace: Option<String>,
    pub timeout_ms: u64,
    pub upsert_batch_size: usize,
}

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            index_name: "document-embeddings".to_string(),
            host: None,
            control_plane_url: "https://api.pinecone.io".to_string(),
            cloud: "aws".to_string(),
            region: "us-west-2".to_string(),
            namespace: None,
            timeout_ms: 10_000,
            upsert_batch_size: 100,
        }
    }
}

impl VectorIndexConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn api_key(&self) -> Option<&str> {
        non_empty(self.api_key.as_deref())
    }

    /// Remote index is selected iff credentials are present.
    pub fn has_remote_credentials(&self) -> bool {
        self.api_key().is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Cap on uploaded and downloaded file bodies.
    pub max_upload_bytes: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

/// Answer synthesis over retrieved chunks. Without an API key answers are
/// extracted from the best-ranked chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub timeout_ms: u64,
    /// Chunks retrieved as context when a query names no `top_k`.
    pub context_top_k: usize,
    pub max_clauses: usize,
    /// Weigh questions by phrasing instead of the flat default weight.
    pub weigh_questions: bool,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-1.5-flash".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_ms: 30_000,
            context_top_k: DEFAULT_TOP_K,
            max_clauses: 3,
            weigh_questions: false,
        }
    }
}

impl AnswerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn api_key(&self) -> Option<&str> {
        non_empty(self.api_key.as_deref())
    }
}

/// One-shot "fetch a document, answer a list of questions" runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Bearer token required by the batch route; open when unset.
    pub api_key: Option<String>,
    pub download_timeout_ms: u64,
    pub top_k: usize,
    pub user_id: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            download_timeout_ms: 30_000,
            top_k: 3,
            user_id: "hackrx".to_string(),
        }
    }
}

impl BatchConfig {
    pub fn download_timeout(&self) -> Duration {
        Duration::from_millis(self.download_timeout_ms)
    }

    pub fn api_key(&self) -> Option<&str> {
        non_empty(self.api_key.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
