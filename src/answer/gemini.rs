use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{AnswerBackend, AnswerError};
use crate::core::config::AnswerConfig;

/// Google Generative Language `generateContent` client.
#[derive(Clone)]
pub struct GeminiAnswerBackend {
    client: Client,
    endpoint: String,
    model: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

impl GenerateResponse {
    fn into_text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().map(|part| part.text).collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

impl GeminiAnswerBackend {
    pub fn new(
        api_key: &str,
        endpoint: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, AnswerError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(api_key.trim())
                .map_err(|_| AnswerError::Backend("invalid Google API key".to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|err| AnswerError::Backend(err.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.trim_start_matches("models/").to_string(),
        })
    }

    pub fn from_config(config: &AnswerConfig) -> Option<Result<Self, AnswerError>> {
        let api_key = config.api_key()?;
        Some(Self::new(
            api_key,
            &config.endpoint,
            &config.model,
            config.timeout(),
        ))
    }
}

#[async_trait]
impl AnswerBackend for GeminiAnswerBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, prompt: &str) -> Result<String, AnswerError> {
        let url = format!("{}/models/{}:generateContent", self.endpoint, self.model);
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": 0.2,
                "responseMimeType": "application/json",
            },
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(map_transport)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AnswerError::Backend(format!(
                "Gemini generate error ({}): {}",
                status, body
            )));
        }

        let payload: GenerateResponse = response.json().await.map_err(map_transport)?;
        payload
            .into_text()
            .ok_or_else(|| AnswerError::Backend("Gemini returned no candidates".to_string()))
    }
}

fn map_transport(err: reqwest::Error) -> AnswerError {
    if err.is_timeout() {
        AnswerError::Timeout(err.to_string())
    } else {
        AnswerError::Backend(err.to_string())
    }
}
