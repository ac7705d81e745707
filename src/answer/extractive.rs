use std::collections::HashSet;

use crate::retrieval::ChunkSearchResult;

const MAX_CLAUSE_CHARS: usize = 300;

/// Lowercased question terms worth matching; short words carry no signal.
fn terms(question: &str) -> HashSet<String> {
    question
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() > 2)
        .map(str::to_lowercase)
        .collect()
}

fn sentences(text: &str) -> impl Iterator<Item = &str> {
    text.split_inclusive(['.', '!', '?', '\n'])
        .map(str::trim)
        .filter(|sentence| !sentence.is_empty())
}

fn overlap(sentence: &str, terms: &HashSet<String>) -> usize {
    sentence
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| terms.contains(&word.to_lowercase()))
        .count()
}

/// The sentence of the best-ranked chunk sharing the most terms with the
/// question; the earliest sentence wins ties. Falls back to the chunk text.
pub fn best_sentence(question: &str, best: &ChunkSearchResult) -> String {
    let terms = terms(question);
    let mut chosen: Option<(&str, usize)> = None;
    for sentence in sentences(&best.text) {
        let hits = overlap(sentence, &terms);
        if hits > 0 && chosen.map_or(true, |(_, best_hits)| hits > best_hits) {
            chosen = Some((sentence, hits));
        }
    }
    match chosen {
        Some((sentence, _)) => sentence.to_string(),
        None => truncate(best.text.trim(), MAX_CLAUSE_CHARS),
    }
}

pub fn clauses(chunks: &[&ChunkSearchResult], limit: usize) -> Vec<String> {
    chunks
        .iter()
        .take(limit)
        .map(|chunk| truncate(chunk.text.trim(), MAX_CLAUSE_CHARS))
        .collect()
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", text[..cut].trim_end()),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(text: &str) -> ChunkSearchResult {
        ChunkSearchResult {
            id: "U_D_0".to_string(),
            text: text.to_string(),
            document_id: "D".to_string(),
            chunk_id: 0,
            document_type: "unknown".to_string(),
            session_id: None,
            score: 0.8,
        }
    }

    #[test]
    fn picks_the_sentence_sharing_most_terms() {
        let chunk = hit("Premiums are due monthly. The grace period for late premiums is thirty days. Claims go to the insurer.");
        assert_eq!(
            best_sentence("What is the grace period for premiums?", &chunk),
            "The grace period for late premiums is thirty days."
        );
    }

    #[test]
    fn no_overlap_falls_back_to_chunk_text() {
        let chunk = hit("Completely unrelated text");
        assert_eq!(best_sentence("grace period?", &chunk), "Completely unrelated text");
    }

    #[test]
    fn clauses_are_capped_and_truncated_on_char_boundaries() {
        let long = "é".repeat(MAX_CLAUSE_CHARS + 10);
        let a = hit(&long);
        let b = hit("second");
        let c = hit("third");
        let clauses = clauses(&[&a, &b, &c], 2);

        assert_eq!(clauses.len(), 2);
        assert!(clauses[0].ends_with("..."));
        assert_eq!(clauses[0].chars().count(), MAX_CLAUSE_CHARS + 3);
        assert_eq!(clauses[1], "second");
    }
}
