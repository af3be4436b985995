//! Shared doubles for the scenario tests.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use veritas_core::{AppResult, PipelineSettings};
use veritas_knowledge::{Document, KnowledgeStore, LiveSearch, VerifiedFact, WebPage};
use veritas_llm::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use veritas_prompt::{load_prompt, ANSWER_PROMPT_ID};
use veritas_rag::{AnswerGenerator, RagPipeline, RateLimiter, Rules, ThrottledClient};

pub fn doc(id: &str, content: &str, similarity: f32) -> Document {
    Document {
        id: id.to_string(),
        content: content.to_string(),
        source: format!("https://www.example.edu/{}", id),
        category: None,
        similarity,
    }
}

pub fn page(url: &str, title: &str, content: &str) -> WebPage {
    WebPage {
        title: title.to_string(),
        url: url.to_string(),
        content: content.to_string(),
    }
}

#[derive(Default)]
pub struct StaticStore {
    pub documents: Vec<Document>,
    pub calls: AtomicUsize,
}

impl StaticStore {
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl KnowledgeStore for StaticStore {
    fn name(&self) -> &str {
        "static"
    }

    async fn search(&self, _query: &str, limit: usize, _threshold: f32) -> AppResult<Vec<Document>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.documents.iter().take(limit).cloned().collect())
    }

    async fn search_verified_facts(&self, _query: &str) -> AppResult<Option<VerifiedFact>> {
        Ok(None)
    }
}

#[derive(Default)]
pub struct StaticSearch {
    pub pages: Vec<WebPage>,
    pub calls: AtomicUsize,
}

impl StaticSearch {
    pub fn new(pages: Vec<WebPage>) -> Self {
        Self {
            pages,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LiveSearch for StaticSearch {
    fn provider_name(&self) -> &str {
        "static"
    }

    async fn search(&self, _query: &str, num_results: usize) -> AppResult<Vec<WebPage>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.pages.iter().take(num_results).cloned().collect())
    }
}

/// Provider that always gives the same answer and records when it was called.
pub struct RecordingClient {
    reply: String,
    calls: Mutex<Vec<Instant>>,
}

impl RecordingClient {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait::async_trait]
impl LlmClient for RecordingClient {
    fn provider_name(&self) -> &str {
        "recording"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.calls.lock().push(Instant::now());
        Ok(LlmResponse {
            content: self.reply.clone(),
            model: request.model.clone(),
            usage: LlmUsage::new(200, 40),
        })
    }
}

/// Settings for tests: no dispatch spacing, so only the limiter paces calls.
pub fn settings() -> PipelineSettings {
    let mut settings = PipelineSettings::default();
    settings.queue.min_interval_ms = Some(0);
    settings
}

/// A pipeline over the given doubles, wired the way production wires it.
pub fn pipeline(
    settings: PipelineSettings,
    store: Arc<StaticStore>,
    search: Arc<StaticSearch>,
    client: Arc<RecordingClient>,
) -> RagPipeline {
    let settings = Arc::new(settings);
    let limiter = Arc::new(RateLimiter::from_settings(&settings.queue));
    let throttled: Arc<dyn LlmClient> = Arc::new(ThrottledClient::new(
        client,
        limiter.clone(),
        settings.queue.estimated_tokens,
    ));

    let prompt = load_prompt(Path::new("/nonexistent"), ANSWER_PROMPT_ID).unwrap();
    let generator = Arc::new(AnswerGenerator::new(throttled, "test-model", prompt, &settings));
    let rules = Arc::new(Rules::builtin().unwrap());

    RagPipeline::new(settings, rules, store, search, generator, limiter)
}
