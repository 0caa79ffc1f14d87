//! Per-key token-bucket rate limiting for IPC requests

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Token bucket keyed by caller (IPC clients use [`crate::ClientId`])
#[derive(Debug)]
pub struct RateLimiter<K = crate::ClientId> {
    capacity: u32,
    refill_every: Duration,
    buckets: HashMap<K, Bucket>,
}

#[derive(Debug)]
struct Bucket {
    tokens: u32,
    refilled_at: Instant,
}

impl<K: Eq + Hash + Clone> RateLimiter<K> {
    /// Allow `capacity` requests per `refill_every` for each key
    pub fn new(capacity: u32, refill_every: Duration) -> Self {
        Self {
            capacity,
            refill_every,
            buckets: HashMap::new(),
        }
    }

    /// Take one token for `key`. Returns `false` when the key is over its limit.
    pub fn check(&mut self, key: &K) -> bool {
        self.check_at(key, Instant::now())
    }

    fn check_at(&mut self, key: &K, now: Instant) -> bool {
        let capacity = self.capacity;
        let bucket = self.buckets.entry(key.clone()).or_insert(Bucket {
            tokens: capacity,
            refilled_at: now,
        });

        let elapsed = now.saturating_duration_since(bucket.refilled_at);
        if !self.refill_every.is_zero() && elapsed >= self.refill_every {
            let periods = (elapsed.as_millis() / self.refill_every.as_millis()).min(u32::MAX as u128) as u32;
            bucket.tokens = bucket
                .tokens
                .saturating_add(periods.saturating_mul(capacity))
                .min(capacity);
            bucket.refilled_at = now;
        }

        if bucket.tokens == 0 {
            return false;
        }
        bucket.tokens -= 1;
        true
    }

    /// Forget a key (e.g. a disconnected client)
    pub fn forget(&mut self, key: &K) {
        self.buckets.remove(key);
    }

    /// Number of keys currently tracked
    pub fn tracked(&self) -> usize {
        self.buckets.len()
    }
}
