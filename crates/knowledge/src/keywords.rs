//! Keyword extraction for the keyword half of hybrid search.

use std::collections::HashSet;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is", "it",
    "its", "of", "on", "that", "the", "to", "was", "will", "with", "what", "where", "when", "how",
    "who", "i", "me", "my", "can", "do", "does", "tell", "about", "get", "find",
];

/// Pulls search keywords out of a free-text query.
#[derive(Debug, Clone)]
pub struct KeywordExtractor {
    stop_words: HashSet<&'static str>,
    important_terms: Vec<String>,
}

impl KeywordExtractor {
    /// Create an extractor that promotes the given terms when they occur.
    pub fn new(important_terms: Vec<String>) -> Self {
        Self {
            stop_words: STOP_WORDS.iter().copied().collect(),
            important_terms: important_terms
                .into_iter()
                .map(|t| t.to_lowercase())
                .collect(),
        }
    }

    /// Extract keywords: lower-cased tokens longer than two characters with
    /// stop words dropped, important terms found in the query first.
    pub fn extract(&self, query: &str) -> Vec<String> {
        let lower = query.to_lowercase();

        let mut keywords: Vec<String> = Vec::new();
        for word in lower.split_whitespace() {
            let word = word.trim_matches(|c: char| ".,!?;:\"'()".contains(c));
            if word.chars().count() <= 2 || self.stop_words.contains(word) {
                continue;
            }
            if !keywords.iter().any(|k| k == word) {
                keywords.push(word.to_string());
            }
        }

        let mut promoted: Vec<String> = Vec::new();
        for term in &self.important_terms {
            if contains_term(&lower, term) && !promoted.contains(term) {
                promoted.push(term.clone());
            }
        }

        keywords.retain(|k| !promoted.contains(k));
        promoted.extend(keywords);
        promoted
    }
}

/// Term match on word boundaries, so "cs" does not match "physics".
fn contains_term(haystack: &str, term: &str) -> bool {
    haystack.match_indices(term).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + term.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> KeywordExtractor {
        KeywordExtractor::new(vec![
            "cpt".to_string(),
            "financial aid".to_string(),
            "cs".to_string(),
        ])
    }

    #[test]
    fn test_stop_words_and_short_tokens_removed() {
        let keywords = extractor().extract("How do I get to the library?");
        assert_eq!(keywords, vec!["library".to_string()]);
    }

    #[test]
    fn test_important_terms_first() {
        let keywords = extractor().extract("What documents does CPT need for financial aid?");
        assert_eq!(keywords[0], "cpt");
        assert_eq!(keywords[1], "financial aid");
        assert!(keywords.contains(&"documents".to_string()));
        assert_eq!(keywords.iter().filter(|k| *k == "cpt").count(), 1);
    }

    #[test]
    fn test_short_important_term_needs_word_boundary() {
        let keywords = extractor().extract("physics tutoring");
        assert!(!keywords.contains(&"cs".to_string()));

        let keywords = extractor().extract("cs tutoring");
        assert_eq!(keywords[0], "cs");
    }

    #[test]
    fn test_empty_query() {
        assert!(extractor().extract("   ").is_empty());
    }
}
