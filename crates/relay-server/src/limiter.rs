//! In-memory request limiters backed by governor

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::{Clock, DefaultClock};
use governor::state::keyed::DashMapStateStore;
use governor::{Quota, RateLimiter};
use relay_config::{RateLimitConfig, RequestRateLimit};
use thiserror::Error;

/// Rate limiting errors
#[derive(Debug, Error)]
pub enum RateLimitError {
    /// Configuration error
    #[error("rate limit configuration error: {0}")]
    Config(String),

    /// Rate limit exceeded
    #[error("rate limit exceeded")]
    Exceeded {
        /// Seconds until another request is allowed
        retry_after: u64,
    },
}

type KeyedLimiter = RateLimiter<String, DashMapStateStore<String>, DefaultClock>;

/// Keyed in-memory limiter
#[derive(Clone)]
pub struct MemoryLimiter {
    limiter: Arc<KeyedLimiter>,
    clock: DefaultClock,
}

impl MemoryLimiter {
    /// Allow bursts of `max_requests`, replenished evenly over `window`
    pub fn new(max_requests: u32, window: Duration) -> Result<Self, RateLimitError> {
        if window.is_zero() {
            return Err(RateLimitError::Config("rate limit window must be > 0".to_owned()));
        }

        let burst = NonZeroU32::new(max_requests)
            .ok_or_else(|| RateLimitError::Config("max_requests must be > 0".to_owned()))?;

        let quota = Quota::with_period(window / burst.get())
            .ok_or_else(|| RateLimitError::Config("invalid rate limit period".to_owned()))?
            .allow_burst(burst);

        Ok(Self {
            limiter: Arc::new(RateLimiter::dashmap(quota)),
            clock: DefaultClock::default(),
        })
    }

    /// Check whether a request for `key` is allowed now
    pub fn check(&self, key: &str) -> Result<(), RateLimitError> {
        self.limiter.check_key(&key.to_owned()).map_err(|not_until| {
            let retry_after = not_until.wait_time_from(self.clock.now());
            RateLimitError::Exceeded {
                retry_after: retry_after.as_secs().max(1),
            }
        })
    }
}

/// Global and per-IP request limiter
pub struct RequestLimiter {
    global: Option<MemoryLimiter>,
    per_ip: Option<MemoryLimiter>,
}

impl RequestLimiter {
    /// Create from configuration
    pub fn new(config: &RateLimitConfig) -> Result<Self, RateLimitError> {
        let build = |limit: &RequestRateLimit| MemoryLimiter::new(limit.requests, limit.window);

        Ok(Self {
            global: config.global.as_ref().map(build).transpose()?,
            per_ip: config.per_ip.as_ref().map(build).transpose()?,
        })
    }

    /// Check the limit shared by every client
    pub fn check_global(&self) -> Result<(), RateLimitError> {
        self.global.as_ref().map_or(Ok(()), |limiter| limiter.check("global"))
    }

    /// Check the limit for one client address
    pub fn check_ip(&self, ip: &str) -> Result<(), RateLimitError> {
        self.per_ip.as_ref().map_or(Ok(()), |limiter| limiter.check(ip))
    }
}
