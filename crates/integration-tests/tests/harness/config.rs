//! Programmatic configuration builder for integration tests

use std::net::SocketAddr;
use std::time::Duration;

use relay_config::{
    AnyOrArray, Config, CorsConfig, HealthConfig, RateLimitConfig, RelayConfig, RequestRateLimit, RetryConfig,
    ServerConfig, UpstreamConfig,
};

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Minimal configuration relaying to the mock upstream at `base_url`
    ///
    /// Retry backoff is shortened so retry tests finish quickly.
    pub fn new(base_url: &str) -> Self {
        Self {
            config: Config {
                server: ServerConfig {
                    listen_address: Some(SocketAddr::from(([127, 0, 0, 1], 0))),
                    health: HealthConfig::default(),
                    ..ServerConfig::default()
                },
                upstream: UpstreamConfig::new("sk-test", Some(base_url.parse().expect("valid URL"))),
                relay: RelayConfig {
                    retry: RetryConfig {
                        initial_backoff: Duration::from_millis(10),
                        max_backoff: Duration::from_millis(40),
                        ..RetryConfig::default()
                    },
                    ..RelayConfig::default()
                },
                telemetry: None,
            },
        }
    }

    /// Set the number of upstream attempts per request
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.config.relay.retry.max_attempts = attempts;
        self
    }

    /// Limit concurrent streams and how long a request may queue for a slot
    pub fn with_capacity(mut self, streams: usize, queue_timeout: Duration) -> Self {
        self.config.relay.max_concurrent_streams = streams;
        self.config.relay.queue_timeout = queue_timeout;
        self
    }

    /// Set the longest accepted gap between upstream events
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.upstream.idle_timeout = timeout;
        self
    }

    /// Set the relay-side default system prompt
    pub fn with_default_system_prompt(mut self, prompt: &str) -> Self {
        self.config.relay.default_system_prompt = Some(prompt.to_owned());
        self
    }

    /// Allow cross-origin requests from `origin`
    pub fn with_cors_origin(mut self, origin: &str) -> Self {
        self.config.server.cors = Some(CorsConfig {
            origins: AnyOrArray::List(vec![origin.to_owned()]),
            methods: AnyOrArray::List(vec!["GET".to_owned(), "POST".to_owned()]),
            headers: AnyOrArray::Any,
            expose_headers: Vec::new(),
            credentials: false,
            max_age: None,
        });
        self
    }

    /// Limit each client IP to `requests` per `window`
    pub fn with_per_ip_limit(mut self, requests: u32, window: Duration) -> Self {
        self.config.server.rate_limit = Some(RateLimitConfig {
            global: None,
            per_ip: Some(RequestRateLimit { requests, window }),
        });
        self
    }

    /// Set the request body limit in bytes
    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.config.server.body_limit = limit;
        self
    }

    /// Disable health endpoint
    pub fn without_health(mut self) -> Self {
        self.config.server.health.enabled = false;
        self
    }

    /// Stop adding security headers to responses
    pub fn without_security_headers(mut self) -> Self {
        self.config.server.security_headers.enabled = false;
        self
    }

    /// Build the final config
    pub fn build(self) -> Config {
        self.config
    }
}
