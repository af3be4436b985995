//! Brave search provider. Result pages are fetched for full text, with the
//! search snippet as the fallback when a fetch fails.

use super::{LiveSearch, PageFetcher};
use crate::types::WebPage;
use futures::future::join_all;
use serde::Deserialize;
use std::time::Duration;
use veritas_core::{AppError, AppResult};

const BRAVE_URL: &str = "https://api.search.brave.com/res/v1/web/search";

#[derive(Debug, Deserialize)]
struct BraveResponse {
    #[serde(default)]
    web: Option<BraveWeb>,
}

#[derive(Debug, Deserialize)]
struct BraveWeb {
    #[serde(default)]
    results: Vec<BraveResult>,
}

#[derive(Debug, Deserialize)]
struct BraveResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    description: String,
}

pub struct BraveSearch {
    client: reqwest::Client,
    api_key: String,
    fetcher: PageFetcher,
}

impl BraveSearch {
    pub fn new(api_key: impl Into<String>, fetcher: PageFetcher) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::WebSearch(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            fetcher,
        })
    }
}

#[async_trait::async_trait]
impl LiveSearch for BraveSearch {
    fn provider_name(&self) -> &str {
        "brave"
    }

    #[tracing::instrument(skip(self))]
    async fn search(&self, query: &str, num_results: usize) -> AppResult<Vec<WebPage>> {
        let count = num_results.to_string();
        let response = self
            .client
            .get(BRAVE_URL)
            .header("Accept", "application/json")
            .header("X-Subscription-Token", &self.api_key)
            .query(&[("q", query), ("count", count.as_str())])
            .send()
            .await
            .map_err(|e| AppError::WebSearch(format!("Brave request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::WebSearch(format!(
                "Brave error ({}): {}",
                status, body
            )));
        }

        let payload: BraveResponse = response
            .json()
            .await
            .map_err(|e| AppError::WebSearch(format!("Failed to parse Brave response: {}", e)))?;

        let results: Vec<BraveResult> = payload
            .web
            .map(|w| w.results)
            .unwrap_or_default()
            .into_iter()
            .filter(|r| !r.url.trim().is_empty())
            .take(num_results)
            .collect();

        let fetches = results.iter().map(|r| self.fetcher.fetch_text(r.url.trim()));
        let bodies = join_all(fetches).await;

        Ok(pages_from(results, bodies))
    }
}

/// Pair each result with its fetched body, falling back to the search
/// snippet where the fetch failed.
fn pages_from(results: Vec<BraveResult>, bodies: Vec<AppResult<String>>) -> Vec<WebPage> {
    results
        .into_iter()
        .zip(bodies)
        .map(|(result, body)| {
            let content = match body {
                Ok(text) => text,
                Err(e) => {
                    tracing::debug!("Using snippet for {}: {}", result.url, e);
                    result.description
                }
            };
            WebPage {
                title: result.title,
                url: result.url.trim().to_string(),
                content,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(url: &str, description: &str) -> BraveResult {
        BraveResult {
            title: "Advising".to_string(),
            url: url.to_string(),
            description: description.to_string(),
        }
    }

    #[test]
    fn test_failed_fetch_uses_snippet() {
        let pages = pages_from(
            vec![
                result(" https://advising.sfsu.edu/hours ", "Advising is open 9-5."),
                result("https://advising.sfsu.edu/contact", "Call the front desk."),
            ],
            vec![
                Err(AppError::WebSearch("Fetching returned 403".to_string())),
                Ok("Email advising@sfsu.edu or call 415-555-0100.".to_string()),
            ],
        );

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].content, "Advising is open 9-5.");
        assert_eq!(pages[0].url, "https://advising.sfsu.edu/hours");
        assert_eq!(pages[1].content, "Email advising@sfsu.edu or call 415-555-0100.");
        assert_eq!(pages[1].title, "Advising");
    }

    #[test]
    fn test_response_without_web_section() {
        let payload: BraveResponse = serde_json::from_str(r#"{"query": {"original": "cpt"}}"#).unwrap();
        assert!(payload.web.is_none());

        let payload: BraveResponse =
            serde_json::from_str(r#"{"web": {"results": [{"url": "https://oip.sfsu.edu"}]}}"#).unwrap();
        let results = payload.web.unwrap().results;
        assert_eq!(results[0].url, "https://oip.sfsu.edu");
        assert!(results[0].description.is_empty());
    }
}
