use std::collections::VecDeque;

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Recursive character splitter.
///
/// Tries each separator in turn, from paragraph breaks down to single
/// characters, and merges the pieces back into chunks of at most
/// `chunk_size` chars that overlap by up to `chunk_overlap` chars. Lengths
/// are counted in `char`s, not bytes.
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, &SEPARATORS)
            .into_iter()
            .filter(|chunk| !chunk.trim().is_empty())
            .collect()
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let position = separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(sep))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(position).copied().unwrap_or("");
        let remaining = separators.get(position + 1..).unwrap_or(&[]);

        let pieces: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            text.split(separator)
                .filter(|piece| !piece.is_empty())
                .map(str::to_string)
                .collect()
        };

        let mut chunks = Vec::new();
        let mut pending = Vec::new();
        for piece in pieces {
            if char_len(&piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                chunks.extend(self.merge(&pending, separator));
                pending.clear();
            }
            if remaining.is_empty() {
                chunks.push(piece);
            } else {
                chunks.extend(self.split_with(&piece, remaining));
            }
        }
        if !pending.is_empty() {
            chunks.extend(self.merge(&pending, separator));
        }
        chunks
    }

    /// Greedily packs pieces into chunks, carrying a tail of the previous
    /// chunk forward as overlap.
    fn merge(&self, pieces: &[String], separator: &str) -> Vec<String> {
        let separator_len = char_len(separator);
        let mut chunks = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            let joiner = if current.is_empty() { 0 } else { separator_len };
            if total + len + joiner > self.chunk_size && !current.is_empty() {
                if let Some(chunk) = join(&current, separator) {
                    chunks.push(chunk);
                }
                while total > self.chunk_overlap
                    || (total > 0
                        && total + len + if current.is_empty() { 0 } else { separator_len }
                            > self.chunk_size)
                {
                    let Some(first) = current.pop_front() else {
                        break;
                    };
                    let joined = if current.is_empty() { 0 } else { separator_len };
                    total = total.saturating_sub(char_len(first) + joined);
                }
            }
            let joiner = if current.is_empty() { 0 } else { separator_len };
            current.push_back(piece);
            total += len + joiner;
        }

        if let Some(chunk) = join(&current, separator) {
            chunks.push(chunk);
        }
        chunks
    }
}

fn join(pieces: &VecDeque<&str>, separator: &str) -> Option<String> {
    let joined = pieces
        .iter()
        .copied()
        .collect::<Vec<_>>()
        .join(separator);
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunker = RecursiveChunker::new(1000, 200);
        assert_eq!(chunker.split("hello world"), vec!["hello world"]);
    }

    #[test]
    fn whitespace_only_text_yields_nothing() {
        let chunker = RecursiveChunker::new(1000, 200);
        assert!(chunker.split(" \n\n \n").is_empty());
    }

    #[test]
    fn chunks_respect_size_and_overlap() {
        let chunker = RecursiveChunker::new(50, 10);
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa ".repeat(10);
        let chunks = chunker.split(&text);

        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 50));
        // the next chunk opens with words carried over from the previous tail
        let first_word = chunks[1].split(' ').next().unwrap_or_default();
        let tail = &chunks[0][chunks[0].len().saturating_sub(10)..];
        assert!(!first_word.is_empty());
        assert!(tail.contains(first_word));
    }

    #[test]
    fn paragraphs_are_preferred_boundaries() {
        let chunker = RecursiveChunker::new(40, 0);
        let text = "first paragraph is here\n\nsecond paragraph is here";
        assert_eq!(
            chunker.split(text),
            vec!["first paragraph is here", "second paragraph is here"]
        );
    }

    #[test]
    fn unbroken_text_falls_back_to_characters() {
        let chunker = RecursiveChunker::new(10, 2);
        let text = "x".repeat(25);
        let chunks = chunker.split(&text);

        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        let covered: usize = chunks.iter().map(|c| c.len()).sum();
        assert!(covered >= 25);
    }

    #[test]
    fn multibyte_text_is_measured_in_chars() {
        let chunker = RecursiveChunker::new(5, 0);
        let chunks = chunker.split("日本語のテキスト");
        assert!(chunks.iter().all(|c| c.chars().count() <= 5));
        assert_eq!(chunks.concat(), "日本語のテキスト");
    }
}
