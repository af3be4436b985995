//! Data carried between pipeline stages.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use veritas_llm::ChatMessage;

/// One piece of retrieved evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub id: String,
    pub content: String,

    /// Document source or page URL
    pub source_label: String,

    /// Relevance in 0-1
    pub score: f32,

    /// Page title (web evidence)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Topic category (local evidence)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Evidence from one source for one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub items: Vec<EvidenceItem>,

    /// Aggregate confidence in 0-1
    pub confidence: f32,
    pub timing_ms: u64,

    /// Set when the adapter failed and this result is the degraded empty one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RetrievalResult {
    pub fn new(items: Vec<EvidenceItem>, confidence: f32, timing_ms: u64) -> Self {
        Self {
            items,
            confidence,
            timing_ms,
            error: None,
        }
    }

    /// Zero-count result standing in for a failed adapter call.
    pub fn failed(error: impl Into<String>, timing_ms: u64) -> Self {
        Self {
            items: Vec::new(),
            confidence: 0.0,
            timing_ms,
            error: Some(error.into()),
        }
    }

    pub fn count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Output of the dual-source retriever.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DualRetrieval {
    pub vector: RetrievalResult,
    pub web: RetrievalResult,

    /// Both adapters were invoked for this request
    pub both_attempted: bool,
    pub timing_ms: u64,
}

/// Evidence from both sources, formatted, budgeted and scored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergedContext {
    /// Full context handed to the generator, never longer than the merge budget
    pub combined_text: String,
    pub vector_text: String,
    pub web_text: String,
    pub vector_count: usize,
    pub web_count: usize,
    pub vector_confidence: f32,
    pub web_confidence: f32,
    pub combined_confidence: f32,

    /// Time-sensitive query with content from both sources
    pub has_conflict: bool,
}

/// Payload of one admission-queue task.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub query: String,
    pub context: Arc<MergedContext>,

    /// Most recent conversation turns, oldest first
    pub history: Vec<ChatMessage>,

    /// Validation errors from the previous attempt, for regeneration
    pub feedback: Vec<String>,
}

impl GenerationRequest {
    pub fn new(query: impl Into<String>, context: Arc<MergedContext>, history: Vec<ChatMessage>) -> Self {
        Self {
            query: query.into(),
            context,
            history,
            feedback: Vec::new(),
        }
    }

    pub fn with_feedback(mut self, feedback: Vec<String>) -> Self {
        self.feedback = feedback;
        self
    }
}

/// Why a user-facing fallback replaced a generated answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackKind {
    RateLimit,
    Timeout,
    QueueTimeout,
    Malformed,
    Generic,
}

impl FallbackKind {
    /// Short, apologetic text shown to the user.
    pub fn message(&self) -> &'static str {
        match self {
            FallbackKind::RateLimit => {
                "I'm currently experiencing high demand. Please wait a moment and try again!"
            }
            FallbackKind::Timeout => {
                "The request took too long to process. Please try asking in a simpler way."
            }
            FallbackKind::QueueTimeout => {
                "Your request timed out while waiting in line. Please try again in a moment."
            }
            FallbackKind::Malformed => {
                "I'm having trouble generating a proper response right now. Could you please rephrase your question?"
            }
            FallbackKind::Generic => {
                "I'm sorry, I'm having trouble generating a response right now. Please try again in a moment."
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackKind::RateLimit => "rate_limit",
            FallbackKind::Timeout => "timeout",
            FallbackKind::QueueTimeout => "queue_timeout",
            FallbackKind::Malformed => "malformed",
            FallbackKind::Generic => "generic",
        }
    }
}

/// Generator output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub answer_text: String,
    pub citation_count: usize,

    /// Set once the validator has accepted the answer
    pub validated: bool,
    pub warnings: Vec<String>,

    /// Present when `answer_text` is a fallback message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackKind>,
}

impl GenerationResult {
    pub fn answered(answer_text: String, citation_count: usize) -> Self {
        Self {
            answer_text,
            citation_count,
            validated: false,
            warnings: Vec::new(),
            fallback: None,
        }
    }

    pub fn fallback(kind: FallbackKind, reason: impl Into<String>) -> Self {
        Self {
            answer_text: kind.message().to_string(),
            citation_count: 0,
            validated: false,
            warnings: vec![reason.into()],
            fallback: Some(kind),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

/// Validator output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub is_valid: bool,

    /// Hard failures
    pub errors: Vec<String>,

    /// Logged, non-blocking
    pub warnings: Vec<String>,
    pub can_retry: bool,
    pub citation_count: usize,
}

/// Where the final answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceLabel {
    VerifiedFact,
    DualSource,
    VectorOnly,
    WebOnly,
    NoSources,
    Error,
}

impl SourceLabel {
    /// Label for a merged context by which sources contributed.
    pub fn from_counts(vector_count: usize, web_count: usize) -> Self {
        match (vector_count > 0, web_count > 0) {
            (true, true) => SourceLabel::DualSource,
            (true, false) => SourceLabel::VectorOnly,
            (false, true) => SourceLabel::WebOnly,
            (false, false) => SourceLabel::NoSources,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceLabel::VerifiedFact => "verified_fact",
            SourceLabel::DualSource => "dual_source",
            SourceLabel::VectorOnly => "vector_only",
            SourceLabel::WebOnly => "web_only",
            SourceLabel::NoSources => "no_sources",
            SourceLabel::Error => "error",
        }
    }
}

impl fmt::Display for SourceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    VectorDatabase,
    WebSearch,
    VerifiedFact,
}

/// One contributing source of an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    #[serde(rename = "type")]
    pub kind: SourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_by: Option<String>,
}

/// Citation accounting for an answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CitationsInfo {
    pub citation_count: usize,
    pub local_citations: usize,
    pub web_citations: usize,
    pub sources: Vec<SourceInfo>,
}

/// The pipeline's answer to one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub text: String,
    pub source_label: SourceLabel,
    pub confidence: f32,
    pub response_time_ms: u64,
    pub citations_info: CitationsInfo,
    pub suggested_questions: Vec<String>,
}

impl Answer {
    /// User-safe failure answer.
    pub fn error(text: impl Into<String>, response_time_ms: u64) -> Self {
        Self {
            text: text.into(),
            source_label: SourceLabel::Error,
            confidence: 0.0,
            response_time_ms,
            citations_info: CitationsInfo::default(),
            suggested_questions: Vec::new(),
        }
    }
}
