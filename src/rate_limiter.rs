use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

/// Maximum tokens a bucket can hold.
pub const BUCKET_CAPACITY: f64 = 60.0;
/// Tokens added per minute of elapsed time.
pub const REFILL_PER_MINUTE: f64 = 60.0;

/// Token bucket state for one key (user id or client IP).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateBucket {
    pub tokens: f64,
    pub last: Instant,
}

/// Shared map of rate buckets.
///
/// Buckets live for the lifetime of the process. Nothing is persisted and
/// idle buckets are never evicted.
#[derive(Debug, Clone, Default)]
pub struct BucketStore {
    buckets: Arc<Mutex<HashMap<String, RateBucket>>>,
}

impl BucketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the bucket for `key`, if one exists.
    pub fn get(&self, key: &str) -> Option<RateBucket> {
        self.lock().get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, RateBucket>> {
        // A panic while holding the lock leaves the map consistent; keep serving.
        self.buckets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Per-key token bucket limiter guarding the AI endpoint.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    store: BucketStore,
    capacity: f64,
    refill_per_minute: f64,
}

impl RateLimiter {
    /// Creates a limiter with 60 tokens capacity refilled at 60 tokens/minute.
    pub fn new(store: BucketStore) -> Self {
        Self::with_limits(store, BUCKET_CAPACITY, REFILL_PER_MINUTE)
    }

    pub fn with_limits(store: BucketStore, capacity: f64, refill_per_minute: f64) -> Self {
        Self {
            store,
            capacity,
            refill_per_minute,
        }
    }

    pub fn store(&self) -> &BucketStore {
        &self.store
    }

    /// Consumes one token for `key` if available.
    pub fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now())
    }

    /// Same as [`allow`](Self::allow) with an explicit clock reading.
    ///
    /// Refill, check and decrement happen under one lock, so concurrent callers
    /// sharing a key can never spend the same token twice.
    pub fn allow_at(&self, key: &str, now: Instant) -> bool {
        let mut buckets = self.store.lock();

        let bucket = buckets.entry(key.to_string()).or_insert(RateBucket {
            tokens: self.capacity,
            last: now,
        });

        // A caller that read the clock before a competing caller took the lock
        // sees `now < last`; it gets no refill and must not rewind `last`.
        let elapsed_minutes = now.saturating_duration_since(bucket.last).as_secs_f64() / 60.0;
        bucket.tokens = (bucket.tokens + elapsed_minutes * self.refill_per_minute).min(self.capacity);
        if now > bucket.last {
            bucket.last = now;
        }

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}
