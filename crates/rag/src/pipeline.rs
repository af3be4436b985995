//! The answering pipeline.
//!
//! `answer` runs one query through cache lookup, verified-fact lookup,
//! dual-source retrieval, merging, queued generation with validation and
//! regeneration, the relevance check and finally the cache store. It never
//! fails: every internal error ends in a short user-facing message labeled
//! `error`.

use crate::cache::{CacheStats, ResponseCache};
use crate::generator::{AnswerGenerator, GenerationService};
use crate::merger::ContextMerger;
use crate::monitor::{MetricsSnapshot, PipelineMonitor, QueryOutcome};
use crate::query::{count_citations, enhance_query, strip_citations};
use crate::queue::{AdmissionQueue, QueueStats};
use crate::rate_limiter::{RateLimiter, RateLimiterStats, ThrottledClient};
use crate::relevance::{admission_text, RelevanceChecker};
use crate::retriever::DualSourceRetriever;
use crate::rules::Rules;
use crate::types::{
    Answer, CitationsInfo, GenerationRequest, MergedContext, SourceInfo, SourceKind, SourceLabel,
};
use crate::validator::{fallback_text, ResponseValidator};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use veritas_core::{AppConfig, AppError, AppResult, PipelineSettings};
use veritas_knowledge::{create_live_search, open_knowledge_store, KnowledgeStore, LiveSearch, VerifiedFact};
use veritas_llm::{create_client, ChatMessage, LlmClient};
use veritas_prompt::{load_prompt, ANSWER_PROMPT_ID};

const EMPTY_QUERY: &str = "Please type a question and I'll do my best to help.";

/// Everything the pipeline counts, in one serializable value.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStats {
    pub metrics: MetricsSnapshot,
    pub queue: QueueStats,
    pub rate_limiter: RateLimiterStats,
    pub cache: CacheStats,
}

pub struct RagPipeline {
    settings: Arc<PipelineSettings>,
    rules: Arc<Rules>,
    store: Arc<dyn KnowledgeStore>,
    retriever: DualSourceRetriever,
    merger: ContextMerger,
    validator: ResponseValidator,
    relevance: RelevanceChecker,
    queue: AdmissionQueue,
    limiter: Arc<RateLimiter>,
    cache: ResponseCache,
    monitor: PipelineMonitor,
}

impl RagPipeline {
    /// Assemble a pipeline from its collaborators and start the admission
    /// queue worker. Must be called from within a tokio runtime.
    ///
    /// `limiter` should be the same limiter that gates the generation
    /// provider behind `generator`; it is held here for its statistics.
    pub fn new(
        settings: Arc<PipelineSettings>,
        rules: Arc<Rules>,
        store: Arc<dyn KnowledgeStore>,
        search: Arc<dyn LiveSearch>,
        generator: Arc<dyn GenerationService>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        let queue = AdmissionQueue::start(generator, &settings.queue);

        Self {
            retriever: DualSourceRetriever::new(store.clone(), search, settings.clone()),
            merger: ContextMerger::new(&settings, rules.clone()),
            validator: ResponseValidator::new(settings.validation.clone(), rules.clone()),
            relevance: RelevanceChecker::new(rules.clone()),
            cache: ResponseCache::from_settings(&settings.cache),
            monitor: PipelineMonitor::new(),
            queue,
            limiter,
            store,
            rules,
            settings,
        }
    }

    /// Build every service from the application configuration.
    pub async fn from_config(config: &AppConfig) -> AppResult<Self> {
        config.pipeline.validate()?;
        let settings = Arc::new(config.pipeline.clone());

        let provider = config.provider.to_lowercase();
        let endpoint = config
            .get_provider_config(&provider)
            .and_then(|p| p.endpoint());
        let api_key = config.resolve_api_key(&provider);
        let client = create_client(&provider, endpoint, api_key.as_deref())
            .map_err(|e| AppError::Config(format!("Failed to create LLM client: {}", e)))?;

        let limiter = Arc::new(RateLimiter::from_settings(&settings.queue));
        let client: Arc<dyn LlmClient> = Arc::new(ThrottledClient::new(
            client,
            limiter.clone(),
            settings.queue.estimated_tokens,
        ));

        let prompt = load_prompt(&config.workspace, ANSWER_PROMPT_ID)?;
        let generator = Arc::new(AnswerGenerator::new(
            client,
            config.model.clone(),
            prompt,
            &settings,
        ));

        let store = open_knowledge_store(&settings.knowledge, &config.workspace).await?;
        let search = create_live_search(&settings.web)?;

        let rules_path = settings
            .validation
            .rules_file
            .as_ref()
            .map(|p| config.resolve_path(p));
        let rules = Arc::new(Rules::load(rules_path.as_deref())?);

        tracing::info!(
            "Pipeline ready: provider {} ({}), store {}, live search {}",
            provider,
            config.model,
            store.name(),
            search.provider_name()
        );

        Ok(Self::new(settings, rules, store, search, generator, limiter))
    }

    /// Answer one query. `history` is the conversation so far, oldest first.
    #[tracing::instrument(skip(self, history))]
    pub async fn answer(&self, query: &str, history: &[ChatMessage]) -> Answer {
        let start = Instant::now();
        let elapsed_ms = || start.elapsed().as_millis() as u64;

        let query = query.trim();
        if query.is_empty() {
            self.monitor.record_error(&QueryOutcome::default());
            return Answer::error(EMPTY_QUERY, elapsed_ms());
        }

        if let Some(cached) = self.cache.get(query) {
            tracing::info!("Cache hit");
            self.monitor.record_cache_hit(elapsed_ms());
            return cached;
        }

        let enhanced = enhance_query(query, &self.settings);
        if enhanced != query {
            tracing::debug!("Enhanced query: {}", enhanced);
        }

        if let Some(fact) = self.verified_fact(&enhanced).await {
            let answer = self.verified_fact_answer(query, fact, elapsed_ms());
            self.cache.set(query, answer.clone());
            self.monitor.record_answer(&QueryOutcome {
                label: Some(SourceLabel::VerifiedFact),
                validated: true,
                response_ms: answer.response_time_ms,
                ..QueryOutcome::default()
            });
            return answer;
        }

        let retrieval = self.retriever.retrieve_all(&enhanced).await;
        let context = Arc::new(self.merger.merge(&retrieval.vector, &retrieval.web, &enhanced));
        let label = SourceLabel::from_counts(context.vector_count, context.web_count);

        let mut outcome = QueryOutcome {
            label: Some(label),
            has_conflict: context.has_conflict,
            retrieval_ms: retrieval.timing_ms.max(1),
            ..QueryOutcome::default()
        };

        let mut feedback: Vec<String> = Vec::new();
        let mut attempt: u32 = 0;

        let text = loop {
            attempt += 1;
            let request = GenerationRequest::new(enhanced.clone(), context.clone(), history.to_vec())
                .with_feedback(feedback.clone());
            let result = self.queue.enqueue(request).await;

            if let Some(kind) = result.fallback {
                tracing::warn!("Generation fell back ({}): {:?}", kind.as_str(), result.warnings);
                outcome.response_ms = elapsed_ms();
                self.monitor.record_error(&outcome);
                return Answer::error(result.answer_text, outcome.response_ms);
            }

            let verdict = self.validator.validate(&result.answer_text, &context, query);
            if verdict.is_valid {
                break result.answer_text;
            }

            if self.validator.should_regenerate(&verdict, attempt) {
                tracing::warn!("Regenerating answer (attempt {} rejected)", attempt);
                outcome.regenerations += 1;
                feedback = verdict.errors;
                continue;
            }

            tracing::warn!("Answer rejected after {} attempts; using fallback", attempt);
            outcome.response_ms = elapsed_ms();
            self.monitor.record_validation_failure();
            self.monitor.record_error(&outcome);
            return Answer::error(fallback_text(&self.settings), outcome.response_ms);
        };
        outcome.validated = true;

        let relevance = self.relevance.check(query, &text);
        let text = if relevance.is_relevant {
            text
        } else {
            tracing::warn!(
                "Replacing {} answer that misses the question",
                relevance.question_type.as_str()
            );
            outcome.relevance_substituted = true;
            admission_text(&self.settings)
        };

        let citations = count_citations(&text);
        outcome.citations = citations.total();

        let text = if self.settings.strip_citations {
            strip_citations(&text)
        } else {
            text
        };

        outcome.response_ms = elapsed_ms();
        let answer = Answer {
            text,
            source_label: label,
            confidence: context.combined_confidence,
            response_time_ms: outcome.response_ms,
            citations_info: CitationsInfo {
                citation_count: citations.total(),
                local_citations: citations.local,
                web_citations: citations.web,
                sources: sources_of(&context),
            },
            suggested_questions: self.rules.suggestions_for(query),
        };

        tracing::info!(
            "Answered: {} (confidence {:.2}, {} citations, {} ms)",
            label,
            answer.confidence,
            citations.total(),
            answer.response_time_ms
        );

        self.cache.set(query, answer.clone());
        self.monitor.record_answer(&outcome);
        answer
    }

    /// A verified fact confident enough to answer with directly.
    async fn verified_fact(&self, query: &str) -> Option<VerifiedFact> {
        let limit = Duration::from_secs(self.settings.retrieval.adapter_timeout_secs);
        let threshold = self.settings.retrieval.verified_fact_threshold;

        match tokio::time::timeout(limit, self.store.search_verified_facts(query)).await {
            Ok(Ok(Some(fact))) if fact.confidence > threshold => {
                tracing::info!(
                    "Verified fact matched (confidence {:.2}, verified by {})",
                    fact.confidence,
                    fact.verified_by.as_deref().unwrap_or("unknown")
                );
                Some(fact)
            }
            Ok(Ok(Some(fact))) => {
                tracing::debug!("Verified fact below threshold ({:.2})", fact.confidence);
                None
            }
            Ok(Ok(None)) => None,
            Ok(Err(e)) => {
                tracing::warn!("Verified fact lookup failed: {}", e);
                None
            }
            Err(_) => {
                tracing::warn!("Verified fact lookup timed out after {}s", limit.as_secs());
                None
            }
        }
    }

    fn verified_fact_answer(&self, query: &str, fact: VerifiedFact, response_time_ms: u64) -> Answer {
        Answer {
            text: strip_citations(&fact.answer),
            source_label: SourceLabel::VerifiedFact,
            confidence: fact.confidence,
            response_time_ms,
            citations_info: CitationsInfo {
                sources: vec![SourceInfo {
                    kind: SourceKind::VerifiedFact,
                    count: None,
                    confidence: Some(fact.confidence),
                    verified_by: fact.verified_by,
                }],
                ..CitationsInfo::default()
            },
            suggested_questions: self.rules.suggestions_for(query),
        }
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            metrics: self.monitor.snapshot(),
            queue: self.queue.stats(),
            rate_limiter: self.limiter.stats(),
            cache: self.cache.stats(),
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }
}

fn sources_of(context: &MergedContext) -> Vec<SourceInfo> {
    let mut sources = Vec::new();
    if context.vector_count > 0 {
        sources.push(SourceInfo {
            kind: SourceKind::VectorDatabase,
            count: Some(context.vector_count),
            confidence: Some(context.vector_confidence),
            verified_by: None,
        });
    }
    if context.web_count > 0 {
        sources.push(SourceInfo {
            kind: SourceKind::WebSearch,
            count: Some(context.web_count),
            confidence: Some(context.web_confidence),
            verified_by: None,
        });
    }
    sources
}
