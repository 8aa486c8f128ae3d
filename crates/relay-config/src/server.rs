use std::net::SocketAddr;

use serde::Deserialize;

use crate::{
    cors::CorsConfig, health::HealthConfig, rate_limit::RateLimitConfig, security_headers::SecurityHeadersConfig,
};

/// Default request body limit (1 MiB)
const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address to bind, `0.0.0.0:3001` when unset
    pub listen_address: Option<SocketAddr>,
    /// Maximum accepted request body size in bytes
    #[serde(default = "default_body_limit")]
    pub body_limit: usize,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub cors: Option<CorsConfig>,
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
    #[serde(default)]
    pub security_headers: SecurityHeadersConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: None,
            body_limit: DEFAULT_BODY_LIMIT,
            health: HealthConfig::default(),
            cors: None,
            rate_limit: None,
            security_headers: SecurityHeadersConfig::default(),
        }
    }
}

const fn default_body_limit() -> usize {
    DEFAULT_BODY_LIMIT
}
