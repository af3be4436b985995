//! Tavily search provider. Results already carry extracted page content.

use super::LiveSearch;
use crate::types::WebPage;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use veritas_core::{AppError, AppResult};

const TAVILY_URL: &str = "https://api.tavily.com/search";

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    query: &'a str,
    search_depth: &'static str,
    max_results: usize,
    include_answer: bool,
    include_raw_content: bool,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

pub struct TavilySearch {
    client: reqwest::Client,
    api_key: String,
}

impl TavilySearch {
    pub fn new(api_key: impl Into<String>) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| AppError::WebSearch(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
        })
    }
}

fn into_pages(response: TavilyResponse, num_results: usize) -> Vec<WebPage> {
    response
        .results
        .into_iter()
        .filter(|r| !r.url.trim().is_empty())
        .take(num_results)
        .map(|r| WebPage {
            title: if r.title.is_empty() {
                "Untitled".to_string()
            } else {
                r.title
            },
            url: r.url.trim().to_string(),
            content: r.content,
        })
        .collect()
}

#[async_trait::async_trait]
impl LiveSearch for TavilySearch {
    fn provider_name(&self) -> &str {
        "tavily"
    }

    #[tracing::instrument(skip(self))]
    async fn search(&self, query: &str, num_results: usize) -> AppResult<Vec<WebPage>> {
        let response = self
            .client
            .post(TAVILY_URL)
            .bearer_auth(&self.api_key)
            .json(&TavilyRequest {
                query,
                search_depth: "basic",
                max_results: num_results,
                include_answer: false,
                include_raw_content: false,
            })
            .send()
            .await
            .map_err(|e| AppError::WebSearch(format!("Tavily request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::WebSearch(format!(
                "Tavily error ({}): {}",
                status, body
            )));
        }

        let payload: TavilyResponse = response
            .json()
            .await
            .map_err(|e| AppError::WebSearch(format!("Failed to parse Tavily response: {}", e)))?;

        Ok(into_pages(payload, num_results))
    }
}
