//! Exponential backoff between retries.
//!
//! Waiting goes through `tokio::time::sleep`, so a backoff never blocks the
//! runtime thread and other requests keep making progress while one retries.

use std::time::Duration;

/// Exponential backoff schedule: `base * 2^attempt`, capped at `max`.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    base: Duration,
    max: Duration,
}

impl Backoff {
    /// Create a schedule from a base delay and a ceiling.
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Create a schedule from millisecond values.
    pub fn from_millis(base_ms: u64, max_ms: u64) -> Self {
        Self::new(Duration::from_millis(base_ms), Duration::from_millis(max_ms))
    }

    /// Delay before the retry that follows `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt);
        self.base.saturating_mul(factor).min(self.max)
    }

    /// Sleep for the delay of `attempt` without blocking the executor.
    pub async fn wait(&self, attempt: u32) {
        let delay = self.delay(attempt);
        tracing::debug!("Backing off for {}ms (attempt {})", delay.as_millis(), attempt);
        tokio::time::sleep(delay).await;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::from_millis(1000, 8000)
    }
}
