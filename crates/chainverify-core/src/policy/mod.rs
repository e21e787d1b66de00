//! Outbound-call policies.
//!
//! Explorer calls are gated by a token bucket so a burst of status lookups
//! cannot exhaust a free-tier API key:
//! ```text
//! status lookup → [RateLimiter] → explorer
//! ```

pub mod rate_limiter;

pub use rate_limiter::{RateLimiter, RateLimiterConfig, TokenBucket};
