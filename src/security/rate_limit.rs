//! Rate limiting.
//!
//! The gateway asks a [`RateLimiter`] whether a key may proceed before it
//! looks at routes or credentials. The bundled [`LocalRateLimiter`] keeps one
//! token bucket per key in process memory; a distributed backend implements
//! the same trait.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use thiserror::Error;

use crate::config::RateLimitConfig;

/// Outcome of one limiter check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitDecision {
    pub success: bool,
    /// Requests allowed per window.
    pub limit: u32,
    /// Requests left right now.
    pub remaining: u32,
    /// Seconds until the key's quota is fully restored.
    pub reset_secs: u64,
    /// Seconds until the next request would be admitted; zero when admitted.
    pub retry_after_secs: u64,
}

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("rate limiter backend unavailable: {0}")]
    Backend(String),
}

/// A limiter collaborator.
pub trait RateLimiter: Send + Sync {
    /// Consume one request from `key`'s quota.
    fn limit<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<LimitDecision, RateLimitError>>;
}

/// Build the limiter key for a request: `<ip>:<subject|anonymous>:<path>`.
pub fn rate_limit_key(client_ip: &str, subject: Option<&str>, path: &str) -> String {
    format!("{}:{}:{}", client_ip, subject.unwrap_or("anonymous"), path)
}

/// A simple token bucket.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_update: now,
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();

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

/// In-process token-bucket limiter.
///
/// Capacity is `requests_per_window`; tokens refill continuously at
/// `requests_per_window / window_secs` per second.
#[derive(Debug)]
pub struct LocalRateLimiter {
    buckets: DashMap<String, TokenBucket>,
    limit: u32,
    capacity: f64,
    refill_rate: f64,
}

impl LocalRateLimiter {
    pub fn new(requests_per_window: u32, window: Duration) -> Self {
        let capacity = f64::from(requests_per_window.max(1));
        let window = window.as_secs_f64().max(f64::EPSILON);
        Self {
            buckets: DashMap::new(),
            limit: requests_per_window,
            capacity,
            refill_rate: capacity / window,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(
            config.requests_per_window,
            Duration::from_secs(config.window_secs),
        )
    }

    fn check_at(&self, key: &str, now: Instant) -> LimitDecision {
        let mut bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.capacity, now));

        let success = bucket.try_acquire(self.capacity, self.refill_rate, now);
        let tokens = bucket.tokens;

        let reset_secs = ((self.capacity - tokens) / self.refill_rate).ceil() as u64;
        let retry_after_secs = if success {
            0
        } else {
            (((1.0 - tokens) / self.refill_rate).ceil() as u64).max(1)
        };

        LimitDecision {
            success,
            limit: self.limit,
            remaining: tokens.floor() as u32,
            reset_secs,
            retry_after_secs,
        }
    }

    /// Drop buckets untouched for `idle`. Returns how many were removed.
    pub fn sweep_idle(&self, idle: Duration) -> usize {
        self.sweep_idle_at(idle, Instant::now())
    }

    fn sweep_idle_at(&self, idle: Duration, now: Instant) -> usize {
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| now.saturating_duration_since(bucket.last_update) < idle);
        before.saturating_sub(self.buckets.len())
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.buckets.len()
    }
}

impl RateLimiter for LocalRateLimiter {
    fn limit<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<LimitDecision, RateLimitError>> {
        let decision = self.check_at(key, Instant::now());
        async move { Ok(decision) }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_format() {
        assert_eq!(rate_limit_key("203.0.113.9", None, "/api/ping"), "203.0.113.9:anonymous:/api/ping");
        assert_eq!(rate_limit_key("::1", Some("user|1"), "/"), "::1:user|1:/");
    }

    #[test]
    fn test_quota_exhausts_then_denies() {
        let limiter = LocalRateLimiter::new(3, Duration::from_secs(60));
        let now = Instant::now();

        let remaining: Vec<u32> = (0..3).map(|_| limiter.check_at("k", now).remaining).collect();
        assert_eq!(remaining, vec![2, 1, 0]);

        let denied = limiter.check_at("k", now);
        assert!(!denied.success);
        assert_eq!(denied.limit, 3);
        assert_eq!(denied.remaining, 0);
        // One token every 20s.
        assert_eq!(denied.retry_after_secs, 20);
        assert_eq!(denied.reset_secs, 60);
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = LocalRateLimiter::new(1, Duration::from_secs(60));
        let now = Instant::now();
        assert!(limiter.check_at("a", now).success);
        assert!(!limiter.check_at("a", now).success);
        assert!(limiter.check_at("b", now).success);
    }

    #[test]
    fn test_refill_over_time() {
        let limiter = LocalRateLimiter::new(2, Duration::from_secs(10));
        let start = Instant::now();
        assert!(limiter.check_at("k", start).success);
        assert!(limiter.check_at("k", start).success);
        assert!(!limiter.check_at("k", start).success);

        let later = start + Duration::from_secs(5);
        assert!(limiter.check_at("k", later).success);
        assert!(!limiter.check_at("k", later).success);
    }

    #[test]
    fn test_sweep_idle() {
        let limiter = LocalRateLimiter::new(5, Duration::from_secs(60));
        let start = Instant::now();
        limiter.check_at("old", start);
        limiter.check_at("fresh", start + Duration::from_secs(500));

        let removed = limiter.sweep_idle_at(Duration::from_secs(300), start + Duration::from_secs(600));
        assert_eq!(removed, 1);
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[tokio::test]
    async fn test_trait_call() {
        let limiter = LocalRateLimiter::new(1, Duration::from_secs(1));
        let decision = limiter.limit("k").await.unwrap();
        assert!(decision.success);
        assert_eq!(decision.retry_after_secs, 0);
    }
}
