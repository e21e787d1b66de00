//! Token bucket rate limiter.
//!
//! Tokens accrue at `refill_per_sec` up to `capacity`; each explorer call
//! takes one. An empty bucket means "answer locally with `rate_limited`"
//! rather than wait, since status lookups are polled anyway.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Burst size.
    pub capacity: f64,
    /// Sustained calls per second.
    pub refill_per_sec: f64,
}

impl RateLimiterConfig {
    /// Etherscan-family free tier: 5 calls/s.
    pub fn explorer_free_tier() -> Self {
        Self {
            capacity: 5.0,
            refill_per_sec: 5.0,
        }
    }
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self::explorer_free_tier()
    }
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Thread-safe token bucket.
pub struct TokenBucket {
    config: RateLimiterConfig,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            state: Mutex::new(BucketState {
                tokens: config.capacity,
                last_refill: Instant::now(),
            }),
            config,
        }
    }

    /// Take `cost` tokens if available.
    pub fn try_acquire(&self, cost: f64) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut state);
        if state.tokens >= cost {
            state.tokens -= cost;
            true
        } else {
            false
        }
    }

    /// Time until `cost` tokens will be available.
    pub fn wait_time(&self, cost: f64) -> Duration {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut state);
        let deficit = cost - state.tokens;
        if deficit <= 0.0 || self.config.refill_per_sec <= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(deficit / self.config.refill_per_sec)
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.config.refill_per_sec).min(self.config.capacity);
        state.last_refill = now;
    }
}

/// One token per explorer call.
pub struct RateLimiter {
    bucket: TokenBucket,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            bucket: TokenBucket::new(config),
        }
    }

    pub fn try_acquire(&self) -> bool {
        self.bucket.try_acquire(1.0)
    }

    pub fn wait_time(&self) -> Duration {
        self.bucket.wait_time(1.0)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimiterConfig::default())
    }
}
