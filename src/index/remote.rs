//! Pinecone-backed vector index.
//!
//! Talks to the REST data plane (`/vectors/upsert`, `/query`,
//! `/vectors/delete`). The control plane is only used by `connect` to
//! resolve, and if needed create, the index host.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::math::l2_norm;
use super::{rank_matches, IndexError, Metadata, MetadataFilter, QueryMatch, VectorEntry, VectorIndex};
use crate::core::config::VectorIndexConfig;

const API_VERSION: &str = "2024-07";
const DELETE_BATCH_SIZE: usize = 1000;

#[derive(Clone)]
pub struct PineconeIndex {
    client: Client,
    host: String,
    namespace: Option<String>,
    dimension: usize,
    upsert_batch_size: usize,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [VectorEntry],
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
    include_metadata: bool,
    include_values: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<RemoteMatch>,
}

#[derive(Deserialize)]
struct RemoteMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<Metadata>,
}

#[derive(Deserialize)]
struct IndexDescription {
    host: String,
}

impl PineconeIndex {
    /// Resolve the index host through the control plane, creating a
    /// serverless cosine index when none exists under the configured name.
    pub async fn connect(config: &VectorIndexConfig, dimension: usize) -> Result<Self, IndexError> {
        let api_key = config
            .api_key()
            .ok_or_else(|| IndexError::Transport("missing Pinecone API key".to_string()))?;

        if let Some(host) = config.host.as_deref().filter(|h| !h.trim().is_empty()) {
            return Self::with_host(host, api_key, dimension, config.timeout())
                .map(|index| index.configure(config));
        }

        let client = build_client(api_key, config.timeout())?;
        let control = config.control_plane_url.trim_end_matches('/');
        let describe_url = format!("{}/indexes/{}", control, config.index_name);

        let response = client.get(&describe_url).send().await.map_err(map_transport)?;
        let description: IndexDescription = if response.status() == StatusCode::NOT_FOUND {
            tracing::info!(
                "Creating Pinecone index '{}' (dimension {}, {}/{})",
                config.index_name,
                dimension,
                config.cloud,
                config.region
            );
            let body = json!({
                "name": config.index_name,
                "dimension": dimension,
                "metric": "cosine",
                "spec": {
                    "serverless": {
                        "cloud": config.cloud,
                        "region": config.region,
                    }
                }
            });
            let created = client
                .post(format!("{}/indexes", control))
                .json(&body)
                .send()
                .await
                .map_err(map_transport)?;
            decode(created).await?
        } else {
            decode(response).await?
        };

        tracing::info!("Using Pinecone index '{}' at {}", config.index_name, description.host);
        Self::with_host(&description.host, api_key, dimension, config.timeout())
            .map(|index| index.configure(config))
    }

    /// Build a client for a known data-plane host, skipping the control plane.
    pub fn with_host(
        host: &str,
        api_key: &str,
        dimension: usize,
        timeout: Duration,
    ) -> Result<Self, IndexError> {
        let host = host.trim().trim_end_matches('/');
        let host = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{}", host)
        };

        Ok(Self {
            client: build_client(api_key, timeout)?,
            host,
            namespace: None,
            dimension,
            upsert_batch_size: 100,
        })
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        self.namespace = (!namespace.trim().is_empty()).then_some(namespace);
        self
    }

    pub fn with_upsert_batch_size(mut self, batch_size: usize) -> Self {
        self.upsert_batch_size = batch_size.max(1);
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn configure(mut self, config: &VectorIndexConfig) -> Self {
        if let Some(namespace) = config.namespace.clone() {
            self = self.with_namespace(namespace);
        }
        self.with_upsert_batch_size(config.upsert_batch_size)
    }

    async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<reqwest::Response, IndexError> {
        let url = format!("{}{}", self.host, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(map_transport)?;
        ensure_success(response).await
    }

    async fn run_query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<QueryMatch>, IndexError> {
        let request = QueryRequest {
            vector,
            top_k,
            filter: (!filter.is_empty()).then(|| filter.to_json()),
            include_metadata: true,
            include_values: false,
            namespace: self.namespace.as_deref(),
        };
        let response = self.post("/query", &request).await?;
        let payload: QueryResponse = response
            .json()
            .await
            .map_err(|err| IndexError::Decode(err.to_string()))?;

        Ok(payload
            .matches
            .into_iter()
            .map(|m| QueryMatch {
                id: m.id,
                score: m.score,
                metadata: m.metadata.unwrap_or_default(),
            })
            .collect())
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    fn name(&self) -> &str {
        "pinecone"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn upsert(&self, entries: Vec<VectorEntry>) -> Result<(), IndexError> {
        for entry in &entries {
            IndexError::check_dimension(self.dimension, entry.embedding.len())?;
        }

        // Each request is atomic on the remote side; a batch split across
        // requests is best-effort.
        for batch in entries.chunks(self.upsert_batch_size) {
            let request = UpsertRequest {
                vectors: batch,
                namespace: self.namespace.as_deref(),
            };
            self.post("/vectors/upsert", &request).await?;
        }
        tracing::debug!(count = entries.len(), "pinecone upsert");
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

        let mut matches = if l2_norm(vector) == 0.0 {
            // Cosine is undefined for a zero query; enumerate the filtered
            // candidates with a uniform vector and score them all 0.0.
            let uniform = vec![1.0; self.dimension];
            let mut matches = self.run_query(&uniform, top_k, filter).await?;
            for m in &mut matches {
                m.score = 0.0;
            }
            matches
        } else {
            self.run_query(vector, top_k, filter).await?
        };

        rank_matches(&mut matches);
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn delete(&self, ids: &[String]) -> Result<(), IndexError> {
        for batch in ids.chunks(DELETE_BATCH_SIZE) {
            let mut body = json!({ "ids": batch });
            if let (Some(namespace), Some(obj)) = (self.namespace.as_deref(), body.as_object_mut()) {
                obj.insert("namespace".to_string(), json!(namespace));
            }
            self.post("/vectors/delete", &body).await?;
        }
        Ok(())
    }
}

fn build_client(api_key: &str, timeout: Duration) -> Result<Client, IndexError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        "Api-Key",
        HeaderValue::from_str(api_key.trim())
            .map_err(|_| IndexError::Transport("invalid Pinecone API key".to_string()))?,
    );
    headers.insert(
        "X-Pinecone-API-Version",
        HeaderValue::from_static(API_VERSION),
    );
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .build()
        .map_err(|err| IndexError::Transport(err.to_string()))
}

fn map_transport(err: reqwest::Error) -> IndexError {
    if err.is_timeout() {
        IndexError::Timeout(err.to_string())
    } else {
        IndexError::Transport(err.to_string())
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, IndexError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<body unavailable>".to_string());
    Err(IndexError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn decode<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> Result<T, IndexError> {
    ensure_success(response)
        .await?
        .json()
        .await
        .map_err(|err| {
            if err.is_timeout() {
                IndexError::Timeout(err.to_string())
            } else {
                IndexError::Decode(err.to_string())
            }
        })
}
