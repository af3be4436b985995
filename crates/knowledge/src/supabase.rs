//! Supabase (PostgREST) document index.
//!
//! Similarity search goes through the `match_documents` RPC, verified facts
//! through `match_verified_facts`, and keyword search is an `ilike` filter on
//! the `documents` table.

use crate::embeddings::EmbeddingProvider;
use crate::memory::VERIFIED_FACT_MATCH_THRESHOLD;
use crate::store::DocumentIndex;
use crate::types::{Document, VerifiedFact};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use veritas_core::{AppError, AppResult};

const REQUEST_TIMEOUT_SECS: u64 = 15;
const VERIFIED_FACT_CANDIDATES: usize = 3;

#[derive(Debug, Serialize)]
struct MatchRequest<'a> {
    query_embedding: &'a [f32],
    match_threshold: f32,
    match_count: usize,
}

/// PostgREST-backed document index.
pub struct SupabaseIndex {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl SupabaseIndex {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Knowledge(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            embedder,
        })
    }

    /// Build from the environment variables named in the settings.
    pub fn from_env(
        url_env: &str,
        key_env: &str,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> AppResult<Self> {
        let url = std::env::var(url_env).map_err(|_| {
            AppError::Config(format!("Supabase URL not found in environment variable: {}", url_env))
        })?;
        let key = std::env::var(key_env).map_err(|_| {
            AppError::Config(format!("Supabase key not found in environment variable: {}", key_env))
        })?;
        Self::new(url, key, embedder)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn rpc<T: serde::de::DeserializeOwned>(
        &self,
        function: &str,
        body: &MatchRequest<'_>,
    ) -> AppResult<Vec<T>> {
        let url = format!("{}/rest/v1/rpc/{}", self.base_url, function);
        let response = self
            .authorized(self.client.post(&url))
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Knowledge(format!("Supabase RPC {} failed: {}", function, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Knowledge(format!(
                "Supabase RPC {} error ({}): {}",
                function, status, text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to parse {} response: {}", function, e)))
    }
}

/// PostgREST `ilike` pattern; `*` is the wildcard in query-string filters.
fn ilike_filter(keyword: &str) -> String {
    let escaped: String = keyword
        .chars()
        .filter(|c| !matches!(c, '*' | ',' | '(' | ')'))
        .collect();
    format!("ilike.*{}*", escaped)
}

#[async_trait::async_trait]
impl DocumentIndex for SupabaseIndex {
    fn name(&self) -> &str {
        "supabase"
    }

    #[tracing::instrument(skip(self))]
    async fn similarity_search(
        &self,
        query: &str,
        limit: usize,
        threshold: f32,
    ) -> AppResult<Vec<Document>> {
        let embedding = self.embedder.embed(query).await?;
        self.rpc(
            "match_documents",
            &MatchRequest {
                query_embedding: &embedding,
                match_threshold: threshold,
                match_count: limit,
            },
        )
        .await
    }

    async fn keyword_search(&self, keyword: &str, limit: usize) -> AppResult<Vec<Document>> {
        let url = format!("{}/rest/v1/documents", self.base_url);
        let limit = limit.to_string();
        let filter = ilike_filter(keyword);

        let response = self
            .authorized(self.client.get(&url))
            .query(&[
                ("select", "id,content,source,category"),
                ("content", filter.as_str()),
                ("limit", limit.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Knowledge(format!("Supabase keyword search failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Knowledge(format!(
                "Supabase keyword search error ({}): {}",
                status, text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to parse keyword results: {}", e)))
    }

    async fn verified_facts(&self, query: &str) -> AppResult<Option<VerifiedFact>> {
        let embedding = self.embedder.embed(query).await?;
        let facts: Vec<VerifiedFact> = self
            .rpc(
                "match_verified_facts",
                &MatchRequest {
                    query_embedding: &embedding,
                    match_threshold: VERIFIED_FACT_MATCH_THRESHOLD,
                    match_count: VERIFIED_FACT_CANDIDATES,
                },
            )
            .await?;
        Ok(facts.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::trigram::TrigramProvider;

    #[test]
    fn test_ilike_filter_strips_reserved() {
        assert_eq!(ilike_filter("f-1"), "ilike.*f-1*");
        assert_eq!(ilike_filter("a*b,(c)"), "ilike.*abc*");
    }

    #[test]
    fn test_from_env_missing_url() {
        let result = SupabaseIndex::from_env(
            "VERITAS_TEST_SUPABASE_URL_NEVER_SET",
            "VERITAS_TEST_SUPABASE_KEY_NEVER_SET",
            Arc::new(TrigramProvider::new(8)),
        );
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_match_request_shape() {
        let embedding = [0.5_f32, 0.25];
        let body = serde_json::to_value(MatchRequest {
            query_embedding: &embedding,
            match_threshold: 0.15,
            match_count: 30,
        })
        .unwrap();
        assert_eq!(body["match_count"], 30);
        assert_eq!(body["query_embedding"][1], 0.25);
    }
}
