//! Live web search adapters.
//!
//! Providers are picked by configuration, or in `auto` mode by which API key
//! is present (Tavily before Brave). With no key the disabled adapter is used
//! and the web side of every retrieval is simply empty.

pub mod brave;
pub mod fetch;
pub mod tavily;

pub use brave::BraveSearch;
pub use fetch::PageFetcher;
pub use tavily::TavilySearch;

use crate::types::WebPage;
use std::sync::Arc;
use veritas_core::settings::WebSettings;
use veritas_core::{AppError, AppResult};

/// Live web search capability.
#[async_trait::async_trait]
pub trait LiveSearch: Send + Sync {
    fn provider_name(&self) -> &str;

    /// Up to `num_results` pages for an already-scoped query.
    async fn search(&self, query: &str, num_results: usize) -> AppResult<Vec<WebPage>>;
}

/// Adapter used when no search provider is configured.
#[derive(Debug, Default)]
pub struct DisabledSearch;

#[async_trait::async_trait]
impl LiveSearch for DisabledSearch {
    fn provider_name(&self) -> &str {
        "none"
    }

    async fn search(&self, _query: &str, _num_results: usize) -> AppResult<Vec<WebPage>> {
        Ok(Vec::new())
    }
}

/// Build the configured live search adapter.
pub fn create_live_search(settings: &WebSettings) -> AppResult<Arc<dyn LiveSearch>> {
    let tavily_key = std::env::var(&settings.tavily_key_env).ok().filter(|k| !k.is_empty());
    let brave_key = std::env::var(&settings.brave_key_env).ok().filter(|k| !k.is_empty());

    let missing = |env: &str| AppError::Config(format!("Web search key not found in environment variable: {}", env));

    let search: Arc<dyn LiveSearch> = match settings.provider.as_str() {
        "tavily" => Arc::new(TavilySearch::new(
            tavily_key.ok_or_else(|| missing(&settings.tavily_key_env))?,
        )?),
        "brave" => Arc::new(BraveSearch::new(
            brave_key.ok_or_else(|| missing(&settings.brave_key_env))?,
            PageFetcher::new(settings.fetch_timeout_secs, settings.max_page_chars)?,
        )?),
        "none" => Arc::new(DisabledSearch),
        "auto" => match (tavily_key, brave_key) {
            (Some(key), _) => Arc::new(TavilySearch::new(key)?),
            (None, Some(key)) => Arc::new(BraveSearch::new(
                key,
                PageFetcher::new(settings.fetch_timeout_secs, settings.max_page_chars)?,
            )?),
            (None, None) => {
                tracing::warn!("No web search API key found; live search disabled");
                Arc::new(DisabledSearch)
            }
        },
        other => {
            return Err(AppError::Config(format!(
                "Unknown web provider: {}. Supported: auto, tavily, brave, none",
                other
            )))
        }
    };

    tracing::debug!("Live search provider: {}", search.provider_name());
    Ok(search)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(provider: &str) -> WebSettings {
        WebSettings {
            provider: provider.to_string(),
            tavily_key_env: "VERITAS_TEST_TAVILY_NEVER_SET".to_string(),
            brave_key_env: "VERITAS_TEST_BRAVE_NEVER_SET".to_string(),
            ..WebSettings::default()
        }
    }

    #[tokio::test]
    async fn test_auto_without_keys_is_disabled() {
        let search = create_live_search(&settings("auto")).unwrap();
        assert_eq!(search.provider_name(), "none");
        assert!(search.search("anything", 3).await.unwrap().is_empty());
    }

    #[test]
    fn test_explicit_provider_requires_key() {
        assert!(matches!(
            create_live_search(&settings("brave")),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_unknown_provider() {
        assert!(create_live_search(&settings("bing")).is_err());
    }
}
