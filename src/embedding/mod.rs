//! Embedding provider.
//!
//! `EmbeddingProvider` wraps an optional `EmbeddingBackend` and guarantees
//! one fixed-dimension vector per input. When the backend is missing, slow
//! or broken, it degrades to a constant placeholder vector instead of
//! failing, and records that it did so in `EmbeddingStatus`.

mod gemini;

pub use gemini::GeminiEmbeddingBackend;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::core::config::EmbeddingConfig;
use crate::core::errors::ApiError;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding request timed out: {0}")]
    Timeout(String),
    #[error("embedding backend error: {0}")]
    Backend(String),
    #[error("malformed embedding response: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    fn name(&self) -> &str;

    /// One vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingMode {
    /// A real backend is configured; individual calls may still fall back.
    Backend,
    /// No backend configured; every vector is the placeholder.
    Placeholder,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddingStatus {
    pub mode: EmbeddingMode,
    pub backend: Option<String>,
    pub dimension: usize,
    pub strict: bool,
    /// True while the most recent backend call ended in fallback.
    pub fallback_active: bool,
    pub fallback_events: u64,
}

pub struct EmbeddingProvider {
    backend: Option<Arc<dyn EmbeddingBackend>>,
    dimension: usize,
    fallback_value: f32,
    timeout: Duration,
    strict: bool,
    fallback_active: AtomicBool,
    fallback_events: AtomicU64,
}

impl EmbeddingProvider {
    pub fn new(
        backend: Option<Arc<dyn EmbeddingBackend>>,
        dimension: usize,
        config: &EmbeddingConfig,
    ) -> Self {
        Self {
            backend,
            dimension,
            fallback_value: config.fallback_value,
            timeout: config.timeout(),
            strict: config.strict,
            fallback_active: AtomicBool::new(false),
            fallback_events: AtomicU64::new(0),
        }
    }

    /// Provider without a backend; always returns placeholder vectors.
    pub fn placeholder_only(dimension: usize, config: &EmbeddingConfig) -> Self {
        Self::new(None, dimension, config)
    }

    /// Build from config, wiring the Gemini backend when a key is present.
    pub fn from_config(dimension: usize, config: &EmbeddingConfig) -> Self {
        let backend: Option<Arc<dyn EmbeddingBackend>> =
            match GeminiEmbeddingBackend::from_config(config) {
                Some(Ok(backend)) => Some(Arc::new(backend)),
                Some(Err(err)) => {
                    tracing::warn!("Embedding backend disabled: {}", err);
                    None
                }
                None => {
                    tracing::info!("No embedding API key configured; using placeholder vectors");
                    None
                }
            };
        Self::new(backend, dimension, config)
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn placeholder_vector(&self) -> Vec<f32> {
        vec![self.fallback_value; self.dimension]
    }

    pub fn placeholder(&self, count: usize) -> Vec<Vec<f32>> {
        (0..count).map(|_| self.placeholder_vector()).collect()
    }

    pub fn status(&self) -> EmbeddingStatus {
        EmbeddingStatus {
            mode: if self.backend.is_some() {
                EmbeddingMode::Backend
            } else {
                EmbeddingMode::Placeholder
            },
            backend: self.backend.as_ref().map(|b| b.name().to_string()),
            dimension: self.dimension,
            strict: self.strict,
            fallback_active: self.fallback_active.load(Ordering::Relaxed),
            fallback_events: self.fallback_events.load(Ordering::Relaxed),
        }
    }

    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let Some(backend) = &self.backend else {
            return Ok(self.placeholder(texts.len()));
        };

        let outcome = match tokio::time::timeout(self.timeout, backend.embed(texts)).await {
            Ok(Ok(vectors)) => self.validate(texts.len(), vectors),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(EmbeddingError::Timeout(format!(
                "{} gave no response within {:?}",
                backend.name(),
                self.timeout
            ))),
        };

        match outcome {
            Ok(vectors) => {
                self.fallback_active.store(false, Ordering::Relaxed);
                Ok(vectors)
            }
            Err(err) if self.strict => Err(match err {
                EmbeddingError::Timeout(msg) => ApiError::BackendTimeout(msg),
                other => ApiError::EmbeddingFailure(other.to_string()),
            }),
            Err(err) => {
                self.fallback_active.store(true, Ordering::Relaxed);
                let events = self.fallback_events.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(
                    backend = backend.name(),
                    events,
                    "Embedding fell back to placeholder vectors: {}",
                    err
                );
                Ok(self.placeholder(texts.len()))
            }
        }
    }

    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>, ApiError> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| ApiError::EmbeddingFailure("no vector returned".to_string()))
    }

    fn validate(
        &self,
        expected: usize,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if vectors.len() != expected {
            return Err(EmbeddingError::Malformed(format!(
                "expected {} vectors, got {}",
                expected,
                vectors.len()
            )));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(EmbeddingError::Malformed(format!(
                "expected dimension {}, got {}",
                self.dimension,
                bad.len()
            )));
        }
        Ok(vectors)
    }
}
