//! Page fetching and HTML-to-text conversion for search results.

use scraper::{Html, Node};
use std::time::Duration;
use veritas_core::{AppError, AppResult};

/// Elements whose text never counts as page content.
const SKIPPED_ELEMENTS: [&str; 7] = ["head", "script", "style", "nav", "footer", "header", "noscript"];

/// Fetches result pages and reduces them to plain text.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: reqwest::Client,
    max_chars: usize,
}

impl PageFetcher {
    /// # Arguments
    /// * `timeout_secs` - Per-page fetch timeout
    /// * `max_chars` - Text beyond this many characters is cut and marked with "..."
    pub fn new(timeout_secs: u64, max_chars: usize) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("Mozilla/5.0 (compatible; veritas/0.1)")
            .build()
            .map_err(|e| AppError::WebSearch(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, max_chars })
    }

    /// Fetch `url` and return its visible text.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_text(&self, url: &str) -> AppResult<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::WebSearch(format!("Failed to fetch {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(AppError::WebSearch(format!(
                "Fetching {} returned {}",
                url,
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::WebSearch(format!("Failed to read {}: {}", url, e)))?;

        let text = html_to_text(&body, self.max_chars);
        if text.is_empty() {
            return Err(AppError::WebSearch(format!("No text content at {}", url)));
        }
        Ok(text)
    }
}

/// Visible text of an HTML document with whitespace collapsed.
///
/// Text inside head, script, style, navigation, header and footer elements
/// is dropped. Output longer than `max_chars` is cut and suffixed with "...".
pub fn html_to_text(html: &str, max_chars: usize) -> String {
    let document = Html::parse_document(html);

    let mut parts: Vec<&str> = Vec::new();
    for node in document.tree.root().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let skipped = node.ancestors().any(|ancestor| {
            matches!(ancestor.value(), Node::Element(e) if SKIPPED_ELEMENTS.contains(&e.name()))
        });
        if !skipped {
            parts.push(&**text);
        }
    }

    let collapsed = parts.join(" ").split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() > max_chars {
        let mut cut: String = collapsed.chars().take(max_chars).collect();
        cut.push_str("...");
        cut
    } else {
        collapsed
    }
}
