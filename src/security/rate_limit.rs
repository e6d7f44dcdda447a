//! Per-source connection rate limiting.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;
use tokio::time::Instant;

use crate::config::AdmissionConfig;

/// A simple token bucket rate limiter.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        // Refill tokens
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Registry of per-source buckets, keyed by canonical source address.
///
/// Entries are created on first sight. The registry holds at most
/// `max_tracked_sources` buckets; the least recently seen source is evicted
/// when a new one arrives at capacity, which hands that source a fresh bucket
/// if it comes back.
pub struct SourceRateLimiter {
    buckets: Mutex<LruCache<String, TokenBucket>>,
    rate: f64,
    burst: f64,
}

impl SourceRateLimiter {
    pub fn new(config: &AdmissionConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_tracked_sources).unwrap_or(NonZeroUsize::MIN);
        Self {
            buckets: Mutex::new(LruCache::new(capacity)),
            rate: config.source_rate_per_sec,
            burst: f64::from(config.source_burst),
        }
    }

    /// Make sure `source` has a bucket, without spending a token.
    pub fn register(&self, source: &str) {
        let mut buckets = self.buckets.lock().expect("rate limiter mutex poisoned");
        let burst = self.burst;
        buckets.get_or_insert_mut(source.to_string(), || TokenBucket::new(burst));
    }

    /// Take one token for `source`. Returns false if the source is throttled.
    pub fn check(&self, source: &str) -> bool {
        let mut buckets = self.buckets.lock().expect("rate limiter mutex poisoned");
        let burst = self.burst;
        let bucket = buckets.get_or_insert_mut(source.to_string(), || TokenBucket::new(burst));

        bucket.try_acquire(self.burst, self.rate)
    }

    /// Number of sources currently tracked.
    pub fn tracked(&self) -> usize {
        self.buckets.lock().expect("rate limiter mutex poisoned").len()
    }
}
