use serde::Deserialize;

use super::scoring::ScoreDetails;

pub const NOT_FOUND_ANSWER: &str = "Information not found in the provided document";

fn focus_for(document_type: &str) -> &'static str {
    match document_type {
        "Policy Wordings" => "Focus on policy terms, coverage details, exclusions, and conditions.",
        "Legal Documents" => "Focus on legal clauses, obligations, rights, and legal implications.",
        "Financial Documents" => "Focus on financial data, revenue, expenses, and financial metrics.",
        "Technical Documents" => {
            "Focus on technical specifications, requirements, and implementation details."
        }
        "Medical Documents" => {
            "Focus on medical information, diagnoses, treatments, and patient care."
        }
        _ => "Analyze the general content and provide comprehensive answers.",
    }
}

/// Prompt asking the model for a JSON answer grounded in `context` only.
pub fn build_prompt(question: &str, context: &[&str], score: &ScoreDetails) -> String {
    let chunks: Vec<String> = context
        .iter()
        .enumerate()
        .map(|(index, chunk)| format!("Chunk {}: {}", index + 1, chunk))
        .collect();

    format!(
        r#"You are a document analysis assistant for {document_type} documents.
Answer the question using ONLY the context below.

CONTEXT FROM DOCUMENT:
{context}

QUESTION: {question}

{focus}

Rules:
1. If the context does not contain the answer, answer "{not_found}".
2. Quote or cite the clauses you relied on.
3. Reply with a single JSON object and nothing else:
{{
  "answer": "the answer",
  "justification": "why the context supports it",
  "matched_clauses": ["clauses you relied on"],
  "confidence": 0.0
}}
Confidence is between 0.0 and 1.0."#,
        document_type = score.document_type,
        context = chunks.join("\n"),
        question = question,
        focus = focus_for(&score.document_type),
        not_found = NOT_FOUND_ANSWER,
    )
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelReply {
    pub answer: String,
    #[serde(default)]
    pub justification: String,
    #[serde(default)]
    pub matched_clauses: Vec<String>,
    #[serde(default)]
    pub confidence: Option<f32>,
}

/// The outermost `{ ... }` of a model reply, decoded. Models often wrap the
/// object in prose or code fences.
pub fn parse_reply(reply: &str) -> Option<ModelReply> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&reply[start..=end]).ok()
}
