#![allow(clippy::must_use_candidate)]

pub mod cors;
mod duration;
mod env;
pub mod health;
mod loader;
pub mod rate_limit;
pub mod relay;
pub mod security_headers;
pub mod server;
pub mod telemetry;
pub mod upstream;

use serde::Deserialize;

pub use cors::*;
pub use health::*;
pub use rate_limit::*;
pub use relay::*;
pub use security_headers::*;
pub use server::*;
pub use telemetry::*;
pub use upstream::*;

/// Top-level relay configuration
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Upstream completion provider
    pub upstream: UpstreamConfig,
    /// Relay limits, defaults, and retry policy
    #[serde(default)]
    pub relay: RelayConfig,
    /// Telemetry configuration
    #[serde(default)]
    pub telemetry: Option<TelemetryConfig>,
}
