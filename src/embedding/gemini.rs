use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::try_join_all;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{EmbeddingBackend, EmbeddingError};
use crate::core::config::EmbeddingConfig;

/// Google Generative Language `batchEmbedContents` client.
#[derive(Clone)]
pub struct GeminiEmbeddingBackend {
    client: Client,
    endpoint: String,
    model: String,
    batch_size: usize,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

impl GeminiEmbeddingBackend {
    pub fn new(
        api_key: &str,
        endpoint: &str,
        model: &str,
        timeout: Duration,
        batch_size: usize,
    ) -> Result<Self, EmbeddingError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(api_key.trim())
                .map_err(|_| EmbeddingError::Backend("invalid Google API key".to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|err| EmbeddingError::Backend(err.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.trim_start_matches("models/").to_string(),
            batch_size: batch_size.max(1),
        })
    }

    pub fn from_config(config: &EmbeddingConfig) -> Option<Result<Self, EmbeddingError>> {
        let api_key = config.api_key()?;
        Some(Self::new(
            api_key,
            &config.endpoint,
            &config.model,
            config.timeout(),
            config.batch_size,
        ))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let model_ref = format!("models/{}", self.model);
        let requests: Vec<Value> = texts
            .iter()
            .map(|text| {
                json!({
                    "model": model_ref,
                    "content": { "parts": [{ "text": text }] },
                })
            })
            .collect();

        let url = format!("{}/{}:batchEmbedContents", self.endpoint, model_ref);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "requests": requests }))
            .send()
            .await
            .map_err(map_transport)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Backend(format!(
                "Gemini embed error ({}): {}",
                status, body
            )));
        }

        let payload: BatchEmbedResponse = response.json().await.map_err(map_transport)?;
        Ok(payload.embeddings.into_iter().map(|e| e.values).collect())
    }
}

#[async_trait]
impl EmbeddingBackend for GeminiEmbeddingBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let batches = texts
            .chunks(self.batch_size)
            .map(|batch| self.embed_batch(batch));
        let results = try_join_all(batches).await?;
        Ok(results.into_iter().flatten().collect())
    }
}

fn map_transport(err: reqwest::Error) -> EmbeddingError {
    if err.is_timeout() {
        EmbeddingError::Timeout(err.to_string())
    } else {
        EmbeddingError::Backend(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_prefix_is_normalized() {
        let backend = GeminiEmbeddingBackend::new(
            "key",
            "https://example.com/v1beta/",
            "models/embedding-001",
            Duration::from_secs(1),
            0,
        )
        .unwrap();
        assert_eq!(backend.model, "embedding-001");
        assert_eq!(backend.endpoint, "https://example.com/v1beta");
        assert_eq!(backend.batch_size, 1);
    }

    #[test]
    fn missing_key_means_no_backend() {
        assert!(GeminiEmbeddingBackend::from_config(&EmbeddingConfig::default()).is_none());
    }
}
