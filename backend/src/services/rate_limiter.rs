use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Per-router throttling of billable actions.
///
/// Implementations are best-effort: a limiter shared by several processes may
/// let a few extra requests through at window boundaries.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Counts one `action` for `router_id` and reports whether it is allowed.
    /// A `limit` of zero disables throttling.
    async fn try_acquire(&self, router_id: &str, action: &str, limit: u32) -> bool;
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    count: u32,
    reset_at: Instant,
}

/// Fixed-window counters held in process memory.
#[derive(Debug)]
pub struct InMemoryRateLimiter {
    window: Duration,
    buckets: DashMap<String, Bucket>,
}

impl InMemoryRateLimiter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            buckets: DashMap::new(),
        }
    }

    fn acquire_at(&self, router_id: &str, action: &str, limit: u32, now: Instant) -> bool {
        if limit == 0 {
            return true;
        }

        let key = format!("{router_id}:{action}");
        let mut bucket = self.buckets.entry(key).or_insert(Bucket {
            count: 0,
            reset_at: now + self.window,
        });

        if now >= bucket.reset_at {
            *bucket = Bucket {
                count: 0,
                reset_at: now + self.window,
            };
        }

        if bucket.count >= limit {
            return false;
        }
        bucket.count += 1;
        true
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn try_acquire(&self, router_id: &str, action: &str, limit: u32) -> bool {
        self.acquire_at(router_id, action, limit, Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_within_window() {
        let limiter = InMemoryRateLimiter::new(Duration::from_secs(60));
        let now = Instant::now();

        assert!(limiter.acquire_at("R1", "create", 2, now));
        assert!(limiter.acquire_at("R1", "create", 2, now));
        assert!(!limiter.acquire_at("R1", "create", 2, now));

        // Other actions and routers have their own buckets.
        assert!(limiter.acquire_at("R1", "redeem", 2, now));
        assert!(limiter.acquire_at("R2", "create", 2, now));
    }

    #[test]
    fn test_window_resets() {
        let limiter = InMemoryRateLimiter::new(Duration::from_secs(60));
        let now = Instant::now();

        assert!(limiter.acquire_at("R1", "create", 1, now));
        assert!(!limiter.acquire_at("R1", "create", 1, now + Duration::from_secs(59)));
        assert!(limiter.acquire_at("R1", "create", 1, now + Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn test_zero_limit_disables_throttling() {
        let limiter = InMemoryRateLimiter::new(Duration::from_secs(60));
        for _ in 0..10 {
            assert!(limiter.try_acquire("R1", "grant_topup", 0).await);
        }
    }
}
