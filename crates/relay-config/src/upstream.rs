use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Upstream completion provider (Anthropic Messages API)
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamConfig {
    /// API key sent as `x-api-key`
    pub api_key: SecretString,
    /// Base URL override, `https://api.anthropic.com/v1` when unset
    #[serde(default)]
    pub base_url: Option<Url>,
    /// Model requested for every completion
    #[serde(default = "default_model")]
    pub model: String,
    /// Value of the `anthropic-version` header
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Timeout for establishing the upstream connection and receiving headers
    #[serde(default = "default_connect_timeout", deserialize_with = "crate::duration::deserialize")]
    pub connect_timeout: Duration,
    /// Longest accepted gap between upstream events once streaming
    #[serde(default = "default_idle_timeout", deserialize_with = "crate::duration::deserialize")]
    pub idle_timeout: Duration,
}

impl UpstreamConfig {
    /// Configuration pointing at `base_url` with the given key and defaults elsewhere
    pub fn new(api_key: impl Into<String>, base_url: Option<Url>) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
            base_url,
            model: default_model(),
            api_version: default_api_version(),
            connect_timeout: default_connect_timeout(),
            idle_timeout: default_idle_timeout(),
        }
    }
}

fn default_model() -> String {
    "claude-3-5-sonnet-latest".to_owned()
}

fn default_api_version() -> String {
    "2023-06-01".to_owned()
}

const fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

const fn default_idle_timeout() -> Duration {
    Duration::from_secs(60)
}
