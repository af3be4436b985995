//! Rolling-window rate limiter for the shared generation provider.
//!
//! The provider enforces a per-minute ceiling across every user of the
//! service. The limiter keeps the dispatch times (and estimated tokens) of
//! the last 60 seconds and makes callers wait until the oldest entry leaves
//! the window whenever a new call would exceed the safety-adjusted limit.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use veritas_core::settings::QueueSettings;
use veritas_core::AppResult;
use veritas_llm::{LlmClient, LlmRequest, LlmResponse};

const WINDOW: Duration = Duration::from_secs(60);

/// Usage of the current window.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimiterStats {
    pub requests_in_window: usize,
    pub tokens_in_window: u64,
    pub max_requests: usize,
    pub max_tokens: u64,
    pub total_acquired: u64,
    pub total_waits: u64,
    pub total_wait_ms: u64,
}

/// Sliding 60-second window over requests and tokens.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    max_tokens: u64,
    entries: Mutex<VecDeque<(Instant, u64)>>,
    total_acquired: AtomicU64,
    total_waits: AtomicU64,
    total_wait_ms: AtomicU64,
}

impl RateLimiter {
    /// Create a limiter admitting `floor(limit * safety_factor)` requests and
    /// tokens per minute, at least one of each.
    pub fn new(requests_per_minute: u32, tokens_per_minute: u64, safety_factor: f32) -> Self {
        let factor = f64::from(safety_factor);
        let max_requests = ((f64::from(requests_per_minute) * factor).floor() as usize).max(1);
        let max_tokens = ((tokens_per_minute as f64 * factor).floor() as u64).max(1);

        tracing::debug!(
            "Rate limiter: {} requests/min, {} tokens/min",
            max_requests,
            max_tokens
        );

        Self {
            max_requests,
            max_tokens,
            entries: Mutex::new(VecDeque::new()),
            total_acquired: AtomicU64::new(0),
            total_waits: AtomicU64::new(0),
            total_wait_ms: AtomicU64::new(0),
        }
    }

    pub fn from_settings(settings: &QueueSettings) -> Self {
        Self::new(
            settings.requests_per_minute,
            settings.tokens_per_minute,
            settings.safety_factor,
        )
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// How long a call estimated at `tokens` would have to wait right now.
    pub fn time_until_available(&self, tokens: u64) -> Duration {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        prune(&mut entries, now);
        self.wait_for(&entries, tokens, now)
    }

    /// Wait for capacity, then record the call. Returns the time waited.
    pub async fn acquire(&self, tokens: u64) -> Duration {
        let start = Instant::now();
        let mut waited = false;

        loop {
            let wait = {
                let mut entries = self.entries.lock();
                let now = Instant::now();
                prune(&mut entries, now);
                let wait = self.wait_for(&entries, tokens, now);
                if wait.is_zero() {
                    entries.push_back((now, tokens));
                    None
                } else {
                    Some(wait)
                }
            };

            match wait {
                None => break,
                Some(wait) => {
                    if !waited {
                        waited = true;
                        self.total_waits.fetch_add(1, Ordering::Relaxed);
                    }
                    tracing::warn!(
                        "Rate limit reached, waiting {:.1}s for window capacity",
                        wait.as_secs_f64()
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }

        let elapsed = start.elapsed();
        self.total_acquired.fetch_add(1, Ordering::Relaxed);
        self.total_wait_ms
            .fetch_add(elapsed.as_millis() as u64, Ordering::Relaxed);
        elapsed
    }

    pub fn stats(&self) -> RateLimiterStats {
        let mut entries = self.entries.lock();
        prune(&mut entries, Instant::now());
        RateLimiterStats {
            requests_in_window: entries.len(),
            tokens_in_window: entries.iter().map(|(_, t)| t).sum(),
            max_requests: self.max_requests,
            max_tokens: self.max_tokens,
            total_acquired: self.total_acquired.load(Ordering::Relaxed),
            total_waits: self.total_waits.load(Ordering::Relaxed),
            total_wait_ms: self.total_wait_ms.load(Ordering::Relaxed),
        }
    }

    fn wait_for(&self, entries: &VecDeque<(Instant, u64)>, tokens: u64, now: Instant) -> Duration {
        let mut wait = Duration::ZERO;

        if entries.len() >= self.max_requests {
            let excess = entries.len() + 1 - self.max_requests;
            if let Some((oldest, _)) = entries.get(excess - 1) {
                wait = wait.max(expiry(*oldest, now));
            }
        }

        let used: u64 = entries.iter().map(|(_, t)| t).sum();
        if !entries.is_empty() && used + tokens > self.max_tokens {
            // A call larger than the whole budget only waits for an empty window.
            let mut freed = 0;
            for (at, t) in entries.iter() {
                freed += t;
                if used - freed + tokens <= self.max_tokens || freed == used {
                    wait = wait.max(expiry(*at, now));
                    break;
                }
            }
        }

        wait
    }
}

fn prune(entries: &mut VecDeque<(Instant, u64)>, now: Instant) {
    while let Some((at, _)) = entries.front() {
        if now.duration_since(*at) >= WINDOW {
            entries.pop_front();
        } else {
            break;
        }
    }
}

fn expiry(at: Instant, now: Instant) -> Duration {
    (at + WINDOW).saturating_duration_since(now)
}

/// Generation provider gated by a [`RateLimiter`]: every call, retries
/// included, first acquires window capacity.
pub struct ThrottledClient {
    inner: Arc<dyn LlmClient>,
    limiter: Arc<RateLimiter>,
    estimated_tokens: u64,
}

impl ThrottledClient {
    pub fn new(inner: Arc<dyn LlmClient>, limiter: Arc<RateLimiter>, estimated_tokens: u64) -> Self {
        Self {
            inner,
            limiter,
            estimated_tokens,
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for ThrottledClient {
    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.limiter.acquire(self.estimated_tokens).await;
        self.inner.complete(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedClient;
    use veritas_llm::ChatMessage;

    #[test]
    fn test_capacity_uses_safety_factor() {
        assert_eq!(RateLimiter::new(10, 100_000, 0.9).max_requests(), 9);
        assert_eq!(RateLimiter::new(14, 100_000, 0.9).max_requests(), 12);
        assert_eq!(RateLimiter::new(1, 100_000, 0.5).max_requests(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_until_oldest_expires() {
        let limiter = RateLimiter::new(2, 1_000_000, 1.0);
        limiter.acquire(1).await;
        tokio::time::advance(Duration::from_secs(10)).await;
        limiter.acquire(1).await;

        assert_eq!(limiter.time_until_available(1), Duration::from_secs(50));

        let waited = limiter.acquire(1).await;
        assert!(waited >= Duration::from_secs(50));
        assert!(waited < Duration::from_secs(51));

        let stats = limiter.stats();
        assert_eq!(stats.requests_in_window, 2);
        assert_eq!(stats.total_waits, 1);
        assert_eq!(stats.total_acquired, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_at_exactly_sixty_seconds() {
        let limiter = RateLimiter::new(1, 1_000_000, 1.0);
        limiter.acquire(1).await;
        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(limiter.time_until_available(1), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_budget() {
        let limiter = RateLimiter::new(100, 3_000, 1.0);
        limiter.acquire(1_500).await;
        tokio::time::advance(Duration::from_secs(5)).await;
        limiter.acquire(1_500).await;

        assert_eq!(limiter.time_until_available(1_000), Duration::from_secs(55));
        assert_eq!(limiter.time_until_available(10_000), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttled_client_acquires_per_call() {
        let limiter = Arc::new(RateLimiter::new(100, 1_000_000, 1.0));
        let inner = Arc::new(ScriptedClient::answering("Apply online [Web]."));
        let client = ThrottledClient::new(inner.clone(), limiter.clone(), 1_500);

        let request = LlmRequest::new("m", vec![ChatMessage::user("q")]);
        client.complete(&request).await.unwrap();
        client.complete(&request).await.unwrap();

        let stats = limiter.stats();
        assert_eq!(stats.requests_in_window, 2);
        assert_eq!(stats.tokens_in_window, 3_000);
        assert_eq!(client.provider_name(), "scripted");
    }
}
