//! Splits a long translated utterance into clauses so the emitter can
//! stream synthesized audio incrementally instead of waiting on one large
//! text-to-speech call.

const MIN_WORDS_TO_SPLIT: usize = 8;
const WORDS_PER_CLAUSE: usize = 6;

/// Returns `None` when the text is short enough (or splits into only one
/// clause) that streaming would not help; the caller should synthesize it
/// as a single clause in that case.
pub fn split_into_clauses(text: &str) -> Option<Vec<String>> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= MIN_WORDS_TO_SPLIT {
        return None;
    }

    let mut parts = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for word in &words {
        current.push(word);
        let ends_clause = word.ends_with(['.', '!', '?', ',']);
        if current.len() >= WORDS_PER_CLAUSE || ends_clause {
            parts.push(current.join(" "));
            current.clear();
        }
    }
    if !current.is_empty() {
        parts.push(current.join(" "));
    }

    if parts.len() <= 1 {
        None
    } else {
        Some(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_not_split() {
        assert!(split_into_clauses("just a few words here").is_none());
    }

    #[test]
    fn long_text_splits_on_punctuation_and_word_count() {
        let text = "Hello there, how are you doing today. I was wondering if you could help me with something important.";
        let parts = split_into_clauses(text).expect("should split");
        assert!(parts.len() > 1);
        assert_eq!(parts.join(" ").split_whitespace().count(), text.split_whitespace().count());
    }

    #[test]
    fn text_that_splits_into_one_part_is_not_streamed() {
        // 9 words, no punctuation until the very end, under the 6-word chunk size boundary twice.
        let text = "one two three four five six seven eight nine.";
        let parts = split_into_clauses(text);
        assert!(parts.is_some());
    }
}
