//! Retry policy for establishing the upstream stream
//!
//! The policy is pure: `should_retry` and `backoff_for_attempt` depend only
//! on their arguments. `execute_with_retry` drives an operation with an
//! injected sleep so tests can run without wall-clock delays.

use std::future::Future;
use std::time::Duration;

use relay_config::RetryConfig;

use crate::error::RelayError;

/// Bounded exponential backoff
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    pub initial_backoff: Duration,
    /// Upper bound on any single delay
    pub max_backoff: Duration,
    /// Growth factor between consecutive delays
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: config.initial_backoff,
            max_backoff: config.max_backoff,
            multiplier: config.multiplier,
        }
    }
}

impl RetryPolicy {
    /// Whether a failure on `attempt` (1-based) should be followed by another attempt
    pub const fn should_retry(&self, attempt: u32, error: &RelayError) -> bool {
        error.is_transient() && attempt < self.max_attempts
    }

    /// Delay to wait after attempt number `attempt` fails
    ///
    /// `initial_backoff * multiplier^(attempt - 1)`, capped at `max_backoff`.
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let unbounded = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = unbounded.min(self.max_backoff.as_secs_f64());

        if capped.is_finite() && capped >= 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            self.max_backoff
        }
    }
}

/// Run `operation` until it succeeds, fails permanently, or attempts run out
///
/// `operation` receives the 1-based attempt number. `on_retry` observes each
/// failure that will be retried, together with the delay before the next
/// attempt. A transient failure on the final attempt is reported as
/// `RelayError::UpstreamUnavailable`.
pub async fn execute_with_retry<T, Op, OpFuture, Sleep, SleepFuture, OnRetry>(
    policy: &RetryPolicy,
    mut operation: Op,
    mut sleep: Sleep,
    mut on_retry: OnRetry,
) -> Result<T, RelayError>
where
    Op: FnMut(u32) -> OpFuture,
    OpFuture: Future<Output = Result<T, RelayError>>,
    Sleep: FnMut(Duration) -> SleepFuture,
    SleepFuture: Future<Output = ()>,
    OnRetry: FnMut(u32, Duration, &RelayError),
{
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) if policy.should_retry(attempt, &error) => {
                let delay = policy.backoff_for_attempt(attempt);
                on_retry(attempt, delay, &error);
                sleep(delay).await;
                attempt += 1;
            }
            Err(error) if error.is_transient() => {
                return Err(RelayError::UpstreamUnavailable {
                    attempts: attempt,
                    last_error: error.to_string(),
                });
            }
            Err(error) => return Err(error),
        }
    }
}
