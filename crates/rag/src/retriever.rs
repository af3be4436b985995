//! Dual-source retrieval.
//!
//! Both adapters are called for every request, concurrently, each under its
//! own timeout. A failing or slow adapter degrades to an empty result; the
//! retriever never returns an error.

use crate::query::scoped_web_query;
use crate::types::{DualRetrieval, EvidenceItem, RetrievalResult};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use veritas_core::{AppError, AppResult, PipelineSettings};
use veritas_knowledge::{Document, KnowledgeStore, LiveSearch, WebPage};

/// Fans a query out to the knowledge store and live search.
pub struct DualSourceRetriever {
    store: Arc<dyn KnowledgeStore>,
    search: Arc<dyn LiveSearch>,
    settings: Arc<PipelineSettings>,
}

impl DualSourceRetriever {
    pub fn new(
        store: Arc<dyn KnowledgeStore>,
        search: Arc<dyn LiveSearch>,
        settings: Arc<PipelineSettings>,
    ) -> Self {
        Self {
            store,
            search,
            settings,
        }
    }

    /// Retrieve from both sources and wait for both to finish.
    #[tracing::instrument(skip(self))]
    pub async fn retrieve_all(&self, query: &str) -> DualRetrieval {
        let start = Instant::now();

        let (vector, web) = tokio::join!(self.retrieve_vector(query), self.retrieve_web(query));

        let retrieval = DualRetrieval {
            vector,
            web,
            both_attempted: true,
            timing_ms: start.elapsed().as_millis() as u64,
        };

        tracing::info!("{}", source_summary(&retrieval));
        if retrieval.vector.is_empty() && retrieval.web.is_empty() {
            tracing::warn!("Neither source returned results");
        } else if retrieval.vector.is_empty() {
            tracing::warn!("No knowledge base results; answering from live search only");
        } else if retrieval.web.is_empty() {
            tracing::warn!("No live search results; answering from knowledge base only");
        }

        retrieval
    }

    async fn retrieve_vector(&self, query: &str) -> RetrievalResult {
        let retrieval = &self.settings.retrieval;
        let start = Instant::now();

        let outcome = self
            .bounded(
                "knowledge store",
                self.store
                    .search(query, retrieval.vector_top_k, retrieval.vector_threshold),
            )
            .await;
        let timing_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(documents) => {
                let items: Vec<EvidenceItem> = documents.into_iter().map(local_evidence).collect();
                let confidence = mean_score(&items);
                tracing::debug!(
                    "Knowledge store ({}): {} documents, confidence {:.2}",
                    self.store.name(),
                    items.len(),
                    confidence
                );
                RetrievalResult::new(items, confidence, timing_ms)
            }
            Err(e) => {
                tracing::warn!("Knowledge store search failed, continuing without it: {}", e);
                RetrievalResult::failed(e.to_string(), timing_ms)
            }
        }
    }

    async fn retrieve_web(&self, query: &str) -> RetrievalResult {
        let scoped = scoped_web_query(query, &self.settings);
        let start = Instant::now();

        let outcome = self
            .bounded(
                "live search",
                self.search
                    .search(&scoped, self.settings.retrieval.web_top_results),
            )
            .await;
        let timing_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(pages) => {
                let web_confidence = self.settings.merge.web_confidence;
                let items: Vec<EvidenceItem> = pages
                    .into_iter()
                    .map(|page| web_evidence(page, web_confidence))
                    .collect();
                let confidence = if items.is_empty() { 0.0 } else { web_confidence };
                tracing::debug!(
                    "Live search ({}): {} results for '{}'",
                    self.search.provider_name(),
                    items.len(),
                    scoped
                );
                RetrievalResult::new(items, confidence, timing_ms)
            }
            Err(e) => {
                tracing::warn!("Live search failed, continuing without it: {}", e);
                RetrievalResult::failed(e.to_string(), timing_ms)
            }
        }
    }

    async fn bounded<T>(
        &self,
        adapter: &str,
        call: impl Future<Output = AppResult<T>>,
    ) -> AppResult<T> {
        let limit = Duration::from_secs(self.settings.retrieval.adapter_timeout_secs);
        tokio::time::timeout(limit, call).await.map_err(|_| {
            AppError::Timeout(format!("{} did not answer within {}s", adapter, limit.as_secs()))
        })?
    }
}

fn local_evidence(doc: Document) -> EvidenceItem {
    EvidenceItem {
        id: doc.id,
        content: doc.content,
        source_label: if doc.source.is_empty() {
            "Unknown".to_string()
        } else {
            doc.source
        },
        score: doc.similarity,
        title: None,
        category: doc.category,
    }
}

fn web_evidence(page: WebPage, score: f32) -> EvidenceItem {
    EvidenceItem {
        id: page.url.clone(),
        content: page.content,
        source_label: page.url,
        score,
        title: Some(page.title),
        category: None,
    }
}

fn mean_score(items: &[EvidenceItem]) -> f32 {
    if items.is_empty() {
        return 0.0;
    }
    items.iter().map(|i| i.score).sum::<f32>() / items.len() as f32
}

/// One-line account of what each source returned.
pub fn source_summary(retrieval: &DualRetrieval) -> String {
    format!(
        "Retrieved: {} documents from knowledge base, {} live web results ({} ms)",
        retrieval.vector.count(),
        retrieval.web.count(),
        retrieval.timing_ms
    )
}
