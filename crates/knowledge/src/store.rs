//! Knowledge store interfaces and hybrid scoring.
//!
//! A [`DocumentIndex`] is a raw backend (in-memory, Supabase) that can do a
//! similarity lookup and a substring lookup. [`HybridStore`] layers the
//! hybrid ranking on top and exposes the [`KnowledgeStore`] interface the
//! answering pipeline consumes.

use crate::keywords::KeywordExtractor;
use crate::types::{Document, VerifiedFact};
use std::collections::HashMap;
use std::sync::Arc;
use veritas_core::AppResult;

/// Score multiplier for documents found only by keyword search.
pub const KEYWORD_ONLY_DISCOUNT: f32 = 0.7;

/// Knowledge store as seen by the answering pipeline.
#[async_trait::async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Ranked documents for `query`, at most `limit`, scores in 0-1.
    async fn search(&self, query: &str, limit: usize, threshold: f32) -> AppResult<Vec<Document>>;

    /// Best verified fact matching `query`, if any.
    async fn search_verified_facts(&self, query: &str) -> AppResult<Option<VerifiedFact>>;
}

/// Raw document backend.
#[async_trait::async_trait]
pub trait DocumentIndex: Send + Sync {
    fn name(&self) -> &str;

    /// Documents whose embedding similarity to `query` is at least `threshold`.
    async fn similarity_search(
        &self,
        query: &str,
        limit: usize,
        threshold: f32,
    ) -> AppResult<Vec<Document>>;

    /// Documents whose content contains `keyword`, case-insensitively.
    async fn keyword_search(&self, keyword: &str, limit: usize) -> AppResult<Vec<Document>>;

    async fn verified_facts(&self, query: &str) -> AppResult<Option<VerifiedFact>>;
}

/// Hybrid similarity + keyword ranking over a [`DocumentIndex`].
pub struct HybridStore {
    index: Arc<dyn DocumentIndex>,
    extractor: KeywordExtractor,
    keyword_limit: usize,
    keyword_candidates: usize,
}

impl HybridStore {
    /// Wrap an index.
    ///
    /// # Arguments
    /// * `index` - Backend providing raw lookups
    /// * `extractor` - Keyword extractor for the keyword pass
    /// * `keyword_limit` - How many extracted keywords are searched
    /// * `keyword_candidates` - Documents requested per keyword
    pub fn new(
        index: Arc<dyn DocumentIndex>,
        extractor: KeywordExtractor,
        keyword_limit: usize,
        keyword_candidates: usize,
    ) -> Self {
        Self {
            index,
            extractor,
            keyword_limit,
            keyword_candidates,
        }
    }
}

#[async_trait::async_trait]
impl KnowledgeStore for HybridStore {
    fn name(&self) -> &str {
        self.index.name()
    }

    #[tracing::instrument(skip(self), fields(backend = %self.index.name()))]
    async fn search(&self, query: &str, limit: usize, threshold: f32) -> AppResult<Vec<Document>> {
        let vector_docs = self
            .index
            .similarity_search(query, limit.saturating_mul(2), threshold)
            .await?;

        let keywords: Vec<String> = self
            .extractor
            .extract(query)
            .into_iter()
            .take(self.keyword_limit)
            .collect();

        if keywords.is_empty() {
            let mut docs = vector_docs;
            docs.truncate(limit);
            return Ok(docs);
        }

        tracing::debug!("Hybrid keywords: {:?}", keywords);

        let mut keyword_docs: Vec<Document> = Vec::new();
        for keyword in &keywords {
            match self
                .index
                .keyword_search(keyword, self.keyword_candidates)
                .await
            {
                Ok(docs) => {
                    for doc in docs {
                        if !keyword_docs.iter().any(|d| d.id == doc.id) {
                            keyword_docs.push(doc);
                        }
                    }
                }
                Err(e) => tracing::warn!("Keyword search for '{}' failed: {}", keyword, e),
            }
        }

        Ok(combine_scores(vector_docs, keyword_docs, &keywords, limit))
    }

    async fn search_verified_facts(&self, query: &str) -> AppResult<Option<VerifiedFact>> {
        self.index.verified_facts(query).await
    }
}

/// Merge similarity and keyword candidates into one ranking.
///
/// Documents found by both passes score the mean of their similarity and
/// keyword scores; similarity-only documents keep their similarity;
/// keyword-only documents get their keyword score discounted by
/// [`KEYWORD_ONLY_DISCOUNT`]. The keyword score is the fraction of keywords
/// the document contains.
pub fn combine_scores(
    vector_docs: Vec<Document>,
    keyword_docs: Vec<Document>,
    keywords: &[String],
    limit: usize,
) -> Vec<Document> {
    let keyword_score = |doc: &Document| -> f32 {
        if keywords.is_empty() {
            return 0.0;
        }
        let content = doc.content.to_lowercase();
        let matched = keywords
            .iter()
            .filter(|k| content.contains(k.as_str()))
            .count();
        matched as f32 / keywords.len() as f32
    };

    let keyword_ids: HashMap<&str, &Document> =
        keyword_docs.iter().map(|d| (d.id.as_str(), d)).collect();

    let mut combined: Vec<Document> = Vec::with_capacity(vector_docs.len() + keyword_docs.len());

    for doc in &vector_docs {
        let score = if keyword_ids.contains_key(doc.id.as_str()) {
            (doc.similarity + keyword_score(doc)) / 2.0
        } else {
            doc.similarity
        };
        combined.push(doc.clone().with_similarity(score));
    }

    for doc in &keyword_docs {
        if vector_docs.iter().any(|v| v.id == doc.id) {
            continue;
        }
        let score = keyword_score(doc) * KEYWORD_ONLY_DISCOUNT;
        combined.push(doc.clone().with_similarity(score));
    }

    combined.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    combined.truncate(limit);
    combined
}
