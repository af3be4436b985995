//! Knowledge system type definitions.

use serde::{Deserialize, Serialize};

/// A document from the knowledge store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Stable document identifier
    pub id: String,

    /// Document text
    pub content: String,

    /// Where the document came from (URL or file name)
    #[serde(default)]
    pub source: String,

    /// Topic category (e.g., "admissions", "international")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Relevance score for the query that produced this document (0-1)
    #[serde(default)]
    pub similarity: f32,
}

impl Document {
    /// Category label for display, "general" when unset.
    pub fn category_label(&self) -> &str {
        self.category.as_deref().unwrap_or("general")
    }

    /// Copy of this document carrying a different score.
    pub fn with_similarity(mut self, similarity: f32) -> Self {
        self.similarity = similarity;
        self
    }
}

/// A reviewer-approved answer to a known question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedFact {
    /// The question this fact answers
    pub question: String,

    /// The approved answer text
    pub answer: String,

    /// Reviewer confidence in the answer (0-1)
    pub confidence: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Who approved the answer
    #[serde(default, alias = "verified_by", skip_serializing_if = "Option::is_none")]
    pub verified_by: Option<String>,
}

/// One live web search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebPage {
    pub title: String,
    pub url: String,

    /// Page text, or the search snippet when the page could not be fetched
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_jsonl_defaults() {
        let doc: Document =
            serde_json::from_str(r#"{"id": "d1", "content": "CPT requires an offer letter."}"#)
                .unwrap();
        assert_eq!(doc.similarity, 0.0);
        assert_eq!(doc.category_label(), "general");
        assert!(doc.source.is_empty());
    }

    #[test]
    fn test_verified_fact_accepts_snake_case_reviewer() {
        let fact: VerifiedFact = serde_json::from_str(
            r#"{"question": "q", "answer": "a", "confidence": 0.9, "verified_by": "prof"}"#,
        )
        .unwrap();
        assert_eq!(fact.verified_by.as_deref(), Some("prof"));
    }
}
