//! Query shaping and citation text handling.

use regex::Regex;
use std::sync::LazyLock;
use veritas_core::PipelineSettings;

static RE_CITATION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\[(local|web)\]").ok());

/// A tag together with the whitespace before it.
static RE_CITATION_SPACED: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\s*\[(?:local|web)\]").ok());

static RE_WHITESPACE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\s+").ok());

/// Openings that read better with "at <institution>" than "in <institution>".
const TARGETED_OPENINGS: &[&str] = &[
    "who is", "who are", "who was", "where is", "where are", "where can", "when is", "when are",
    "when do", "how do i", "how can i", "how to", "what is the", "what are the", "is there",
    "are there", "does", "do they", "do you",
];

/// Scope a query to the institution unless it already names it.
///
/// "How do I apply for CPT?" becomes "How do I apply for CPT at SFSU?";
/// "Tell me about CS courses" becomes "Tell me about CS courses in SFSU?".
pub fn enhance_query(query: &str, settings: &PipelineSettings) -> String {
    if settings.mentions_institution(query) {
        return query.to_string();
    }

    let lower = query.trim().to_lowercase();
    let stem = query.trim().trim_end_matches('?').trim_end();
    let short_name = &settings.institution_short_name;

    if TARGETED_OPENINGS.iter().any(|o| lower.starts_with(o)) {
        format!("{} at {}?", stem, short_name)
    } else {
        format!("{} in {}?", stem, short_name)
    }
}

/// Live search query qualified with the full institution name.
pub fn scoped_web_query(query: &str, settings: &PipelineSettings) -> String {
    if settings.mentions_institution(query) {
        query.to_string()
    } else {
        format!("{} {}", settings.institution, query)
    }
}

/// Citation tag counts of an answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CitationCounts {
    pub local: usize,
    pub web: usize,
}

impl CitationCounts {
    pub fn total(&self) -> usize {
        self.local + self.web
    }
}

/// Count `[Local]` and `[Web]` tags, in any letter case.
pub fn count_citations(text: &str) -> CitationCounts {
    let mut counts = CitationCounts::default();
    let Some(re) = RE_CITATION.as_ref() else {
        return counts;
    };
    for caps in re.captures_iter(text) {
        if caps[1].eq_ignore_ascii_case("local") {
            counts.local += 1;
        } else {
            counts.web += 1;
        }
    }
    counts
}

/// Remove citation tags for display and collapse the whitespace they leave.
pub fn strip_citations(text: &str) -> String {
    let (Some(citation), Some(whitespace)) = (RE_CITATION_SPACED.as_ref(), RE_WHITESPACE.as_ref())
    else {
        return text.trim().to_string();
    };
    let without = citation.replace_all(text, "");
    whitespace.replace_all(&without, " ").trim().to_string()
}
