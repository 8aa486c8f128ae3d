use std::time::Duration;

use serde::Deserialize;

/// Relay limits and request defaults
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// Maximum number of simultaneously open upstream streams
    #[serde(default = "default_max_concurrent_streams")]
    pub max_concurrent_streams: usize,
    /// How long a request may wait for a free upstream slot; zero rejects immediately
    #[serde(default, deserialize_with = "crate::duration::deserialize")]
    pub queue_timeout: Duration,
    /// Largest accepted `maxTokens`
    #[serde(default = "default_max_tokens_limit")]
    pub max_tokens_limit: u32,
    /// `maxTokens` used when the request omits it
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,
    /// `temperature` used when the request omits it
    #[serde(default = "default_temperature")]
    pub default_temperature: f64,
    /// System prompt used when the request omits it
    #[serde(default)]
    pub default_system_prompt: Option<String>,
    /// Retry policy for establishing the upstream stream
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_concurrent_streams: default_max_concurrent_streams(),
            queue_timeout: Duration::ZERO,
            max_tokens_limit: default_max_tokens_limit(),
            default_max_tokens: default_max_tokens(),
            default_temperature: default_temperature(),
            default_system_prompt: None,
            retry: RetryConfig::default(),
        }
    }
}

/// Exponential backoff applied to transient upstream failures
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Total attempts, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry
    #[serde(default = "default_initial_backoff", deserialize_with = "crate::duration::deserialize")]
    pub initial_backoff: Duration,
    /// Upper bound on any single delay
    #[serde(default = "default_max_backoff", deserialize_with = "crate::duration::deserialize")]
    pub max_backoff: Duration,
    /// Growth factor between consecutive delays
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff: default_initial_backoff(),
            max_backoff: default_max_backoff(),
            multiplier: default_multiplier(),
        }
    }
}

const fn default_max_concurrent_streams() -> usize {
    64
}

const fn default_max_tokens_limit() -> u32 {
    4096
}

const fn default_max_tokens() -> u32 {
    1000
}

const fn default_temperature() -> f64 {
    0.7
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_initial_backoff() -> Duration {
    Duration::from_millis(200)
}

const fn default_max_backoff() -> Duration {
    Duration::from_secs(5)
}

const fn default_multiplier() -> f64 {
    2.0
}
