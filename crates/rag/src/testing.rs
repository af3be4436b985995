//! Test doubles for the three external interfaces.

use crate::generator::GenerationService;
use crate::types::{GenerationRequest, GenerationResult};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use veritas_core::{AppError, AppResult};
use veritas_knowledge::{Document, KnowledgeStore, LiveSearch, VerifiedFact, WebPage};
use veritas_llm::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use veritas_prompt::{load_prompt, PromptDefinition, ANSWER_PROMPT_ID};

pub fn doc(id: &str, content: &str, similarity: f32) -> Document {
    Document {
        id: id.to_string(),
        content: content.to_string(),
        source: format!("{}.example.edu", id),
        category: None,
        similarity,
    }
}

pub fn page(url: &str, content: &str) -> WebPage {
    WebPage {
        title: "Page".to_string(),
        url: url.to_string(),
        content: content.to_string(),
    }
}

/// Store returning fixed documents and an optional verified fact.
#[derive(Default)]
pub struct FixedStore {
    documents: Vec<Document>,
    fact: Option<VerifiedFact>,
    pub calls: AtomicUsize,
}

impl FixedStore {
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents,
            ..Self::default()
        }
    }

    pub fn with_fact(mut self, fact: VerifiedFact) -> Self {
        self.fact = Some(fact);
        self
    }
}

#[async_trait::async_trait]
impl KnowledgeStore for FixedStore {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn search(&self, _query: &str, limit: usize, _threshold: f32) -> AppResult<Vec<Document>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.documents.iter().take(limit).cloned().collect())
    }

    async fn search_verified_facts(&self, _query: &str) -> AppResult<Option<VerifiedFact>> {
        Ok(self.fact.clone())
    }
}

#[derive(Default)]
pub struct FailingStore {
    pub calls: AtomicUsize,
}

#[async_trait::async_trait]
impl KnowledgeStore for FailingStore {
    fn name(&self) -> &str {
        "failing"
    }

    async fn search(&self, _query: &str, _limit: usize, _threshold: f32) -> AppResult<Vec<Document>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(AppError::Knowledge("connection refused".to_string()))
    }

    async fn search_verified_facts(&self, _query: &str) -> AppResult<Option<VerifiedFact>> {
        Err(AppError::Knowledge("connection refused".to_string()))
    }
}

/// Search returning fixed pages and remembering the last query.
#[derive(Default)]
pub struct FixedSearch {
    pages: Vec<WebPage>,
    last_query: Mutex<Option<String>>,
    pub calls: AtomicUsize,
}

impl FixedSearch {
    pub fn new(pages: Vec<WebPage>) -> Self {
        Self {
            pages,
            ..Self::default()
        }
    }

    pub fn last_query(&self) -> Option<String> {
        self.last_query.lock().clone()
    }
}

#[async_trait::async_trait]
impl LiveSearch for FixedSearch {
    fn provider_name(&self) -> &str {
        "fixed"
    }

    async fn search(&self, query: &str, num_results: usize) -> AppResult<Vec<WebPage>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_query.lock() = Some(query.to_string());
        Ok(self.pages.iter().take(num_results).cloned().collect())
    }
}

#[derive(Default)]
pub struct FailingSearch {
    pub calls: AtomicUsize,
}

#[async_trait::async_trait]
impl LiveSearch for FailingSearch {
    fn provider_name(&self) -> &str {
        "failing"
    }

    async fn search(&self, _query: &str, _num_results: usize) -> AppResult<Vec<WebPage>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(AppError::WebSearch("503 Service Unavailable".to_string()))
    }
}

/// Search that answers only after a delay.
pub struct SlowSearch {
    delay: Duration,
}

impl SlowSearch {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait::async_trait]
impl LiveSearch for SlowSearch {
    fn provider_name(&self) -> &str {
        "slow"
    }

    async fn search(&self, _query: &str, _num_results: usize) -> AppResult<Vec<WebPage>> {
        tokio::time::sleep(self.delay).await;
        Ok(vec![page("https://slow.example.edu", "late")])
    }
}

/// Generation provider replaying scripted outcomes; the last one repeats.
pub struct ScriptedClient {
    script: Mutex<VecDeque<AppResult<String>>>,
    last: Mutex<Option<AppResult<String>>>,
    requests: Mutex<Vec<LlmRequest>>,
    pub calls: AtomicUsize,
}

impl ScriptedClient {
    pub fn new(script: Vec<AppResult<String>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            last: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn answering(text: &str) -> Self {
        Self::new(vec![Ok(text.to_string())])
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().clone()
    }
}

fn replay(outcome: &AppResult<String>) -> AppResult<String> {
    match outcome {
        Ok(text) => Ok(text.clone()),
        Err(AppError::RateLimited(m)) => Err(AppError::RateLimited(m.clone())),
        Err(AppError::Timeout(m)) => Err(AppError::Timeout(m.clone())),
        Err(e) => Err(AppError::Llm(e.to_string())),
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedClient {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        let next = self.script.lock().pop_front();
        let outcome = match next {
            Some(outcome) => {
                let replayed = replay(&outcome);
                *self.last.lock() = Some(outcome);
                replayed
            }
            None => match self.last.lock().as_ref() {
                Some(outcome) => replay(outcome),
                None => Err(AppError::Llm("empty script".to_string())),
            },
        };

        outcome.map(|content| LlmResponse {
            content,
            model: request.model.clone(),
            usage: LlmUsage::new(100, 50),
        })
    }
}

/// Generation service that records queries and answers after a delay.
pub struct DelayedService {
    delay: Duration,
    seen: Mutex<Vec<(String, tokio::time::Instant)>>,
    pub calls: AtomicUsize,
}

impl DelayedService {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            seen: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Queries in dispatch order with their start times.
    pub fn seen(&self) -> Vec<(String, tokio::time::Instant)> {
        self.seen.lock().clone()
    }
}

#[async_trait::async_trait]
impl GenerationService for DelayedService {
    async fn generate(&self, request: GenerationRequest) -> GenerationResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .push((request.query.clone(), tokio::time::Instant::now()));
        tokio::time::sleep(self.delay).await;
        GenerationResult::answered(format!("Answer to {} [Local]", request.query), 1)
    }
}

/// The built-in answer prompt.
pub fn answer_prompt() -> PromptDefinition {
    load_prompt(Path::new("/nonexistent"), ANSWER_PROMPT_ID).unwrap()
}
