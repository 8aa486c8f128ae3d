use std::time::Duration;

use serde::Deserialize;

/// In-memory request rate limiting in front of the relay
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Limit shared by all clients
    #[serde(default)]
    pub global: Option<RequestRateLimit>,
    /// Limit applied per client IP
    #[serde(default)]
    pub per_ip: Option<RequestRateLimit>,
}

/// Request budget over a window
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestRateLimit {
    /// Maximum requests per window
    pub requests: u32,
    /// Window duration (e.g. "1m", "15m")
    #[serde(deserialize_with = "crate::duration::deserialize")]
    pub window: Duration,
}
