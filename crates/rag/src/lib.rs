//! Grounded dual-source answering.
//!
//! Every query is answered from two independent sources, a curated
//! knowledge store and live web search, under strict grounding rules:
//!
//! 1. [`DualSourceRetriever`] queries both sources concurrently; a failing
//!    source degrades to an empty result.
//! 2. [`ContextMerger`] formats and budgets the evidence, flags possible
//!    conflicts and scores the combined confidence.
//! 3. [`AnswerGenerator`] calls the generation provider through the
//!    [`AdmissionQueue`] and a shared [`RateLimiter`].
//! 4. [`ResponseValidator`] and [`RelevanceChecker`] reject fabricated or
//!    off-topic answers, triggering regeneration or a safe fallback.
//! 5. [`ResponseCache`] memoizes full answers for a short time.
//!
//! [`RagPipeline::answer`] ties the stages together.

pub mod cache;
pub mod generator;
pub mod merger;
pub mod monitor;
pub mod output;
pub mod pipeline;
pub mod query;
pub mod queue;
pub mod rate_limiter;
pub mod relevance;
pub mod retriever;
pub mod rules;
pub mod types;
pub mod validator;

#[cfg(test)]
mod testing;

pub use cache::{CacheStats, ResponseCache};
pub use generator::{AnswerGenerator, GenerationService};
pub use merger::ContextMerger;
pub use monitor::{MetricsSnapshot, PipelineMonitor};
pub use pipeline::{PipelineStats, RagPipeline};
pub use queue::{AdmissionQueue, QueueStats};
pub use rate_limiter::{RateLimiter, RateLimiterStats, ThrottledClient};
pub use relevance::{RelevanceChecker, RelevanceVerdict};
pub use retriever::DualSourceRetriever;
pub use rules::{QuestionType, RuleSet, Rules};
pub use types::{
    Answer, CitationsInfo, DualRetrieval, EvidenceItem, FallbackKind, GenerationRequest,
    GenerationResult, MergedContext, RetrievalResult, SourceInfo, SourceKind, SourceLabel,
    ValidationVerdict,
};
pub use validator::ResponseValidator;
