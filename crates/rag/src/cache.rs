//! Short-lived memoization of full answers.
//!
//! Keys are the SHA-256 of the trimmed, lower-cased query. The cache holds a
//! fixed number of entries with least-recently-used eviction; an entry older
//! than the TTL is dropped when it is next looked up.

use crate::types::Answer;
use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use veritas_core::settings::CacheSettings;

#[derive(Debug, Clone)]
struct CacheEntry {
    answer: Answer,
    created_at: Instant,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub expirations: u64,
}

pub struct ResponseCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
}

impl ResponseCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self::new(settings.capacity, Duration::from_secs(settings.ttl_secs))
    }

    /// Cache key for a query.
    pub fn key(query: &str) -> String {
        let normalized = query.trim().to_lowercase();
        format!("{:x}", Sha256::digest(normalized.as_bytes()))
    }

    pub fn get(&self, query: &str) -> Option<Answer> {
        let key = Self::key(query);
        let mut entries = self.entries.lock();

        let expired = match entries.get(&key) {
            Some(entry) if entry.created_at.elapsed() < self.ttl => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.answer.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.pop(&key);
            self.expirations.fetch_add(1, Ordering::Relaxed);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub fn set(&self, query: &str, answer: Answer) {
        let entry = CacheEntry {
            answer,
            created_at: Instant::now(),
        };
        let key = Self::key(query);
        if let Some((evicted, _)) = self.entries.lock().push(key.clone(), entry) {
            if evicted != key {
                tracing::debug!("Cache full, evicted least recently used entry");
            }
        }
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock();
        CacheStats {
            entries: entries.len(),
            capacity: entries.cap().get(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(text: &str) -> Answer {
        Answer::error(text, 5)
    }

    #[test]
    fn test_key_normalizes_query() {
        assert_eq!(
            ResponseCache::key("  How do I apply for CPT? "),
            ResponseCache::key("how do i apply for cpt?")
        );
        assert_ne!(ResponseCache::key("cpt"), ResponseCache::key("opt"));
        assert_eq!(ResponseCache::key("cpt").len(), 64);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_after_set_until_ttl() {
        let cache = ResponseCache::new(10, Duration::from_secs(3600));
        cache.set("Where is the library?", answer("J. Paul Leonard Library"));

        tokio::time::advance(Duration::from_secs(3599)).await;
        assert_eq!(
            cache.get("where is the library?").map(|a| a.text),
            Some("J. Paul Leonard Library".to_string())
        );

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get("Where is the library?").is_none());
        assert!(cache.is_empty());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.expirations, 1);
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let cache = ResponseCache::new(2, Duration::from_secs(3600));
        cache.set("a", answer("A"));
        cache.set("b", answer("B"));
        assert!(cache.get("a").is_some());

        cache.set("c", answer("C"));
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let cache = ResponseCache::new(0, Duration::from_secs(60));
        assert_eq!(cache.stats().capacity, 1);
    }
}
