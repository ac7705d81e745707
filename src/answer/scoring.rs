//! Answer score arithmetic: `score = question_weight * document_weight`.

use serde::{Deserialize, Serialize};

use crate::pipeline::is_known_document_type;

pub const DEFAULT_QUESTION_WEIGHT: f32 = 2.0;
pub const KNOWN_DOCUMENT_WEIGHT: f32 = 0.5;
pub const UNKNOWN_DOCUMENT_WEIGHT: f32 = 2.0;

const COMPLEX_MARKERS: &[&str] = &["compare", "analyze", "explain", "describe", "what are the"];
const CLOSED_MARKERS: &[&str] = &["does", "is", "are", "can", "will"];

/// Unrecognized or undetected document types weigh more than known ones.
pub fn document_weight(document_type: &str) -> f32 {
    if is_known_document_type(document_type) {
        KNOWN_DOCUMENT_WEIGHT
    } else {
        UNKNOWN_DOCUMENT_WEIGHT
    }
}

/// Weight a question by its phrasing: analytical questions 2.0, yes/no
/// questions 1.5, anything else 1.0.
pub fn question_weight(question: &str) -> f32 {
    let lower = question.to_lowercase();
    if COMPLEX_MARKERS.iter().any(|marker| lower.contains(marker)) {
        return 2.0;
    }
    let closed = lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| CLOSED_MARKERS.contains(&word));
    if closed {
        1.5
    } else {
        1.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreDetails {
    pub document_type: String,
    pub question_weight: f32,
    pub document_weight: f32,
    pub score: f32,
}

impl ScoreDetails {
    pub fn new(document_type: &str, question_weight: f32) -> Self {
        let document_weight = document_weight(document_type);
        Self {
            document_type: document_type.to_string(),
            question_weight,
            document_weight,
            score: question_weight * document_weight,
        }
    }

    /// Weights as usual, but nothing earned: no context was found.
    pub fn unanswered(document_type: &str, question_weight: f32) -> Self {
        Self {
            score: 0.0,
            ..Self::new(document_type, question_weight)
        }
    }
}

/// Totals over a batch of answered questions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total_score: f32,
    pub correct_answers: usize,
    pub total_questions: usize,
    pub accuracy: f32,
    pub average_score: f32,
}

impl BatchSummary {
    pub fn from_scores(scores: &[f32]) -> Self {
        let total_questions = scores.len();
        let total_score: f32 = scores.iter().sum();
        let correct_answers = scores.iter().filter(|score| **score > 0.0).count();
        let (accuracy, average_score) = if total_questions == 0 {
            (0.0, 0.0)
        } else {
            (
                correct_answers as f32 / total_questions as f32,
                total_score / total_questions as f32,
            )
        };
        Self {
            total_score,
            correct_answers,
            total_questions,
            accuracy,
            average_score,
        }
    }
}

/// Rough quality grade of an answer from its confidence, detail and
/// references.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerQuality {
    pub quality_score: f32,
    pub quality_factors: Vec<&'static str>,
    pub clause_count: usize,
}

impl AnswerQuality {
    pub fn evaluate(answer: &str, confidence: f32, matched_clauses: &[String]) -> Self {
        let mut score = 0.0;
        let mut factors = Vec::new();

        let (points, factor) = if confidence > 0.8 {
            (0.3, "High confidence")
        } else if confidence > 0.6 {
            (0.2, "Medium confidence")
        } else {
            (0.1, "Low confidence")
        };
        score += points;
        factors.push(factor);

        let length = answer.chars().count();
        if length > 100 {
            score += 0.2;
            factors.push("Detailed answer");
        } else if length > 50 {
            score += 0.1;
            factors.push("Moderate detail");
        }

        let (points, factor) = match matched_clauses.len() {
            0 => (0.1, "No specific references"),
            1 | 2 => (0.2, "Some references"),
            _ => (0.3, "Multiple references"),
        };
        score += points;
        factors.push(factor);

        let lower = answer.to_lowercase();
        if lower.contains("not found") || lower.contains("information not available") {
            score += 0.2;
            factors.push("Honest about limitations");
        }

        Self {
            quality_score: f32::min(score, 1.0),
            quality_factors: factors,
            clause_count: matched_clauses.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_is_question_weight_times_document_weight() {
        let known = ScoreDetails::new("Policy Wordings", DEFAULT_QUESTION_WEIGHT);
        assert_eq!(known.document_weight, 0.5);
        assert_eq!(known.score, 1.0);

        let unknown = ScoreDetails::new("unknown", DEFAULT_QUESTION_WEIGHT);
        assert_eq!(unknown.document_weight, 2.0);
        assert_eq!(unknown.score, 4.0);

        let custom = ScoreDetails::new("Board minutes", 1.5);
        assert_eq!(custom.score, 3.0);

        let empty = ScoreDetails::unanswered("unknown", DEFAULT_QUESTION_WEIGHT);
        assert_eq!(empty.document_weight, 2.0);
        assert_eq!(empty.score, 0.0);
    }

    #[test]
    fn question_phrasing_sets_the_weight() {
        assert_eq!(question_weight("Explain the waiting period"), 2.0);
        assert_eq!(question_weight("What are the exclusions?"), 2.0);
        assert_eq!(question_weight("Is dental covered?"), 1.5);
        // "this" must not count as "is"
        assert_eq!(question_weight("Grace period for this plan"), 1.0);
    }

    #[test]
    fn batch_summary_counts_positive_scores() {
        let summary = BatchSummary::from_scores(&[4.0, 0.0, 1.0, 1.0]);
        assert_eq!(summary.total_questions, 4);
        assert_eq!(summary.correct_answers, 3);
        assert_eq!(summary.total_score, 6.0);
        assert_eq!(summary.accuracy, 0.75);
        assert_eq!(summary.average_score, 1.5);

        let empty = BatchSummary::from_scores(&[]);
        assert_eq!(empty.accuracy, 0.0);
        assert_eq!(empty.average_score, 0.0);
    }

    #[test]
    fn quality_rewards_confidence_detail_and_references() {
        let clauses: Vec<String> = (0..3).map(|i| format!("clause {i}")).collect();
        let detailed = "x".repeat(120);
        let quality = AnswerQuality::evaluate(&detailed, 0.9, &clauses);
        assert!((quality.quality_score - 0.8).abs() < 1e-6);
        assert_eq!(
            quality.quality_factors,
            vec!["High confidence", "Detailed answer", "Multiple references"]
        );

        let honest = AnswerQuality::evaluate("Information not found in the document", 0.2, &[]);
        assert!((honest.quality_score - 0.4).abs() < 1e-6);
        assert_eq!(honest.clause_count, 0);
        assert!(honest.quality_factors.contains(&"Honest about limitations"));
    }
}
