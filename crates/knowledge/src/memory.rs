//! In-process document index loaded from JSONL files.
//!
//! Each line of the documents file is one [`Document`]; each line of the
//! verified facts file is one [`VerifiedFact`]. Embeddings are computed once
//! at load time.

use crate::embeddings::{cosine_similarity, EmbeddingProvider};
use crate::store::DocumentIndex;
use crate::types::{Document, VerifiedFact};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use veritas_core::{AppError, AppResult};

/// Minimum question similarity for a verified fact to match.
pub const VERIFIED_FACT_MATCH_THRESHOLD: f32 = 0.7;

struct Embedded<T> {
    item: T,
    embedding: Vec<f32>,
}

/// Document index held entirely in memory.
pub struct MemoryIndex {
    embedder: Arc<dyn EmbeddingProvider>,
    documents: Vec<Embedded<Document>>,
    facts: Vec<Embedded<VerifiedFact>>,
}

impl MemoryIndex {
    /// Build an index from already-parsed documents and facts.
    pub async fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        documents: Vec<Document>,
        facts: Vec<VerifiedFact>,
    ) -> AppResult<Self> {
        let doc_texts: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
        let doc_embeddings = embedder.embed_batch(&doc_texts).await?;

        let fact_texts: Vec<String> = facts.iter().map(|f| f.question.clone()).collect();
        let fact_embeddings = embedder.embed_batch(&fact_texts).await?;

        tracing::info!(
            "Memory index ready: {} documents, {} verified facts ({} embeddings)",
            documents.len(),
            facts.len(),
            embedder.provider_name()
        );

        Ok(Self {
            embedder,
            documents: documents
                .into_iter()
                .zip(doc_embeddings)
                .map(|(item, embedding)| Embedded { item, embedding })
                .collect(),
            facts: facts
                .into_iter()
                .zip(fact_embeddings)
                .map(|(item, embedding)| Embedded { item, embedding })
                .collect(),
        })
    }

    /// Load documents and facts from JSONL files. Missing paths mean empty sets.
    pub async fn load(
        embedder: Arc<dyn EmbeddingProvider>,
        documents_path: Option<&Path>,
        facts_path: Option<&Path>,
    ) -> AppResult<Self> {
        let documents = match documents_path {
            Some(path) => read_jsonl(path)?,
            None => Vec::new(),
        };
        let facts = match facts_path {
            Some(path) => read_jsonl(path)?,
            None => Vec::new(),
        };
        Self::new(embedder, documents, facts).await
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }
}

/// Parse one JSON value per non-empty line.
fn read_jsonl<T: DeserializeOwned>(path: &Path) -> AppResult<Vec<T>> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        AppError::Knowledge(format!("Failed to read {:?}: {}", path, e))
    })?;

    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|e| {
                AppError::Knowledge(format!("{:?} line {}: {}", path, i + 1, e))
            })
        })
        .collect()
}

#[async_trait::async_trait]
impl DocumentIndex for MemoryIndex {
    fn name(&self) -> &str {
        "memory"
    }

    async fn similarity_search(
        &self,
        query: &str,
        limit: usize,
        threshold: f32,
    ) -> AppResult<Vec<Document>> {
        let query_embedding = self.embedder.embed(query).await?;

        let mut scored: Vec<Document> = self
            .documents
            .iter()
            .map(|d| {
                let score = cosine_similarity(&query_embedding, &d.embedding);
                d.item.clone().with_similarity(score)
            })
            .filter(|d| d.similarity >= threshold)
            .collect();

        scored.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn keyword_search(&self, keyword: &str, limit: usize) -> AppResult<Vec<Document>> {
        let needle = keyword.to_lowercase();
        Ok(self
            .documents
            .iter()
            .filter(|d| d.item.content.to_lowercase().contains(&needle))
            .take(limit)
            .map(|d| d.item.clone())
            .collect())
    }

    async fn verified_facts(&self, query: &str) -> AppResult<Option<VerifiedFact>> {
        if self.facts.is_empty() {
            return Ok(None);
        }

        let query_embedding = self.embedder.embed(query).await?;

        Ok(self
            .facts
            .iter()
            .map(|f| (cosine_similarity(&query_embedding, &f.embedding), f))
            .filter(|(score, _)| *score >= VERIFIED_FACT_MATCH_THRESHOLD)
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, f)| f.item.clone()))
    }
}
