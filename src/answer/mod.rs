//! Answer synthesis.
//!
//! `AnswerSynthesizer` turns ranked chunks into an answer with a
//! justification, the clauses it relied on, a confidence, and score details.
//! A language-model backend is optional: without one, or when it fails, the
//! answer is extracted from the best-ranked chunk instead.

mod extractive;
mod gemini;
mod prompt;
pub mod scoring;

pub use gemini::GeminiAnswerBackend;
pub use scoring::{AnswerQuality, BatchSummary, ScoreDetails};

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::core::config::AnswerConfig;
use crate::retrieval::ChunkSearchResult;

pub const NO_CONTEXT_ANSWER: &str =
    "No relevant information found in the specified document(s) for your question.";

/// Confidence given to a model reply that was not the requested JSON.
const UNSTRUCTURED_CONFIDENCE: f32 = 0.8;

#[derive(Debug, Error)]
pub enum AnswerError {
    #[error("answer request timed out: {0}")]
    Timeout(String),
    #[error("answer backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait AnswerBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Raw completion text for a prompt.
    async fn complete(&self, prompt: &str) -> Result<String, AnswerError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    Model,
    Extractive,
    NoContext,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub answer: String,
    pub justification: String,
    pub matched_clauses: Vec<String>,
    pub score_details: ScoreDetails,
    pub confidence: f32,
    pub source: AnswerSource,
}

pub struct AnswerSynthesizer {
    backend: Option<Arc<dyn AnswerBackend>>,
    max_clauses: usize,
    weigh_questions: bool,
}

impl AnswerSynthesizer {
    pub fn new(backend: Option<Arc<dyn AnswerBackend>>, config: &AnswerConfig) -> Self {
        Self {
            backend,
            max_clauses: config.max_clauses,
            weigh_questions: config.weigh_questions,
        }
    }

    /// Build from config, wiring the Gemini backend when a key is present.
    pub fn from_config(config: &AnswerConfig) -> Self {
        let backend: Option<Arc<dyn AnswerBackend>> =
            match GeminiAnswerBackend::from_config(config) {
                Some(Ok(backend)) => Some(Arc::new(backend)),
                Some(Err(err)) => {
                    tracing::warn!("Answer backend disabled: {}", err);
                    None
                }
                None => {
                    tracing::info!("No answer API key configured; answers are extractive");
                    None
                }
            };
        Self::new(backend, config)
    }

    pub fn backend_name(&self) -> Option<&str> {
        self.backend.as_ref().map(|b| b.name())
    }

    pub fn question_weight(&self, question: &str) -> f32 {
        if self.weigh_questions {
            scoring::question_weight(question)
        } else {
            scoring::DEFAULT_QUESTION_WEIGHT
        }
    }

    /// Answer `question` from `chunks`, which are expected best-first.
    pub async fn answer(
        &self,
        question: &str,
        chunks: &[ChunkSearchResult],
        document_type: &str,
    ) -> Answer {
        let question_weight = self.question_weight(question);
        let context: Vec<&ChunkSearchResult> = chunks
            .iter()
            .filter(|chunk| !chunk.text.trim().is_empty())
            .collect();
        if context.is_empty() {
            return Answer {
                answer: NO_CONTEXT_ANSWER.to_string(),
                justification:
                    "The search did not return any relevant document chunks for your query."
                        .to_string(),
                matched_clauses: Vec::new(),
                score_details: ScoreDetails::unanswered(document_type, question_weight),
                confidence: 0.0,
                source: AnswerSource::NoContext,
            };
        }

        let score_details = ScoreDetails::new(document_type, question_weight);
        let Some(backend) = &self.backend else {
            return self.extract(question, &context, score_details);
        };

        let texts: Vec<&str> = context.iter().map(|chunk| chunk.text.as_str()).collect();
        let prompt = prompt::build_prompt(question, &texts, &score_details);
        match backend.complete(&prompt).await {
            Ok(reply) => self.read_reply(&reply, &context, score_details),
            Err(err) => {
                tracing::warn!(
                    backend = backend.name(),
                    "Answer backend failed, extracting instead: {}",
                    err
                );
                self.extract(question, &context, score_details)
            }
        }
    }

    fn read_reply(
        &self,
        reply: &str,
        context: &[&ChunkSearchResult],
        score_details: ScoreDetails,
    ) -> Answer {
        match prompt::parse_reply(reply) {
            Some(parsed) => Answer {
                answer: parsed.answer,
                justification: parsed.justification,
                matched_clauses: parsed.matched_clauses,
                confidence: parsed
                    .confidence
                    .filter(|c| c.is_finite())
                    .map_or(UNSTRUCTURED_CONFIDENCE, |c| c.clamp(0.0, 1.0)),
                score_details,
                source: AnswerSource::Model,
            },
            None => {
                let text = reply.trim();
                Answer {
                    answer: if text.is_empty() {
                        "No answer could be generated from the provided context.".to_string()
                    } else {
                        text.to_string()
                    },
                    justification: format!(
                        "Response generated from {} context.",
                        score_details.document_type
                    ),
                    matched_clauses: extractive::clauses(context, self.max_clauses),
                    confidence: UNSTRUCTURED_CONFIDENCE,
                    score_details,
                    source: AnswerSource::Model,
                }
            }
        }
    }

    fn extract(
        &self,
        question: &str,
        context: &[&ChunkSearchResult],
        score_details: ScoreDetails,
    ) -> Answer {
        let best = context[0];
        Answer {
            answer: extractive::best_sentence(question, best),
            justification: format!(
                "Taken from the closest matching passage (chunk {} of document {}, similarity {:.2}).",
                best.chunk_id, best.document_id, best.score
            ),
            matched_clauses: extractive::clauses(context, self.max_clauses),
            confidence: best.score.clamp(0.0, 1.0),
            score_details,
            source: AnswerSource::Extractive,
        }
    }
}
