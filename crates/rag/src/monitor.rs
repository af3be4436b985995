//! In-process pipeline metrics.

use crate::types::SourceLabel;
use parking_lot::Mutex;
use serde::Serialize;

/// What happened to one answered query.
#[derive(Debug, Clone, Default)]
pub struct QueryOutcome {
    pub label: Option<SourceLabel>,
    pub validated: bool,
    pub regenerations: u32,
    pub relevance_substituted: bool,
    pub has_conflict: bool,
    pub citations: usize,
    pub retrieval_ms: u64,
    pub response_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub total_queries: u64,
    pub cache_hits: u64,
    pub verified_fact_answers: u64,
    pub dual_source_queries: u64,
    pub single_source_queries: u64,
    pub no_source_queries: u64,
    pub validated_responses: u64,
    pub failed_validations: u64,
    pub regenerations: u64,
    pub relevance_substitutions: u64,
    pub conflicts_detected: u64,
    pub total_citations: u64,
    pub errors: u64,
    pub avg_response_time_ms: f64,
    pub avg_retrieval_time_ms: f64,
    pub dual_source_percentage: f64,
    pub validation_success_rate: f64,
    pub avg_citations_per_response: f64,
}

#[derive(Debug, Default)]
struct Counters {
    snapshot: MetricsSnapshot,
    response_ms_sum: u64,
    retrieval_ms_sum: u64,
    retrievals: u64,
}

/// Counters updated by every request; cheap enough to call on the hot path.
#[derive(Debug, Default)]
pub struct PipelineMonitor {
    counters: Mutex<Counters>,
}

impl PipelineMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cache_hit(&self, response_ms: u64) {
        let mut c = self.counters.lock();
        c.snapshot.total_queries += 1;
        c.snapshot.cache_hits += 1;
        c.response_ms_sum += response_ms;
    }

    /// Count an answer the validator rejected for good.
    pub fn record_validation_failure(&self) {
        self.counters.lock().snapshot.failed_validations += 1;
    }

    /// Record a query that ended in an error answer.
    pub fn record_error(&self, outcome: &QueryOutcome) {
        let mut c = self.counters.lock();
        c.snapshot.total_queries += 1;
        c.snapshot.errors += 1;
        c.snapshot.regenerations += u64::from(outcome.regenerations);
        c.response_ms_sum += outcome.response_ms;
        if outcome.retrieval_ms > 0 {
            c.retrievals += 1;
            c.retrieval_ms_sum += outcome.retrieval_ms;
        }
    }

    pub fn record_answer(&self, outcome: &QueryOutcome) {
        let mut c = self.counters.lock();
        let s = &mut c.snapshot;
        s.total_queries += 1;

        match outcome.label {
            Some(SourceLabel::VerifiedFact) => s.verified_fact_answers += 1,
            Some(SourceLabel::DualSource) => s.dual_source_queries += 1,
            Some(SourceLabel::VectorOnly) | Some(SourceLabel::WebOnly) => {
                s.single_source_queries += 1
            }
            Some(SourceLabel::NoSources) => s.no_source_queries += 1,
            Some(SourceLabel::Error) | None => {}
        }

        if outcome.label != Some(SourceLabel::VerifiedFact) {
            if outcome.validated {
                s.validated_responses += 1;
            } else {
                s.failed_validations += 1;
            }
        }

        s.regenerations += u64::from(outcome.regenerations);
        if outcome.relevance_substituted {
            s.relevance_substitutions += 1;
        }
        if outcome.has_conflict {
            s.conflicts_detected += 1;
        }
        s.total_citations += outcome.citations as u64;

        c.response_ms_sum += outcome.response_ms;
        if outcome.retrieval_ms > 0 {
            c.retrievals += 1;
            c.retrieval_ms_sum += outcome.retrieval_ms;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let c = self.counters.lock();
        let mut s = c.snapshot.clone();
        let total = s.total_queries as f64;
        if s.total_queries > 0 {
            s.avg_response_time_ms = c.response_ms_sum as f64 / total;
            s.dual_source_percentage = s.dual_source_queries as f64 / total * 100.0;
            s.validation_success_rate = s.validated_responses as f64 / total * 100.0;
            s.avg_citations_per_response = s.total_citations as f64 / total;
        }
        if c.retrievals > 0 {
            s.avg_retrieval_time_ms = c.retrieval_ms_sum as f64 / c.retrievals as f64;
        }
        s
    }
}
