//! Anthropic Messages API streaming provider

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use relay_config::UpstreamConfig;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use super::{EventStream, Provider};
use crate::error::RelayError;
use crate::protocol::{AnthropicErrorResponse, AnthropicRequest, AnthropicStreamEvent};
use crate::request::CompletionRequest;

/// Default Anthropic API base URL
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Anthropic Messages API provider
pub struct AnthropicProvider {
    client: Client,
    base_url: Url,
    api_key: SecretString,
    api_version: String,
    model: String,
    connect_timeout: std::time::Duration,
}

impl AnthropicProvider {
    /// Create from upstream configuration
    ///
    /// # Errors
    ///
    /// Returns `RelayError::Internal` if the HTTP client cannot be built
    pub fn new(config: &UpstreamConfig) -> Result<Self, RelayError> {
        let base_url = match &config.base_url {
            Some(url) => url.clone(),
            None => Url::parse(DEFAULT_BASE_URL).map_err(|e| anyhow::anyhow!("invalid default base URL: {e}"))?,
        };

        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build upstream client: {e}"))?;

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
            api_version: config.api_version.clone(),
            model: config.model.clone(),
            connect_timeout: config.connect_timeout,
        })
    }

    /// Build the messages endpoint URL
    fn messages_url(&self) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/messages")
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn open_stream(&self, request: &CompletionRequest) -> Result<EventStream, RelayError> {
        let wire_request = AnthropicRequest::streaming(&self.model, request);

        let send = self
            .client
            .post(self.messages_url())
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", &self.api_version)
            .json(&wire_request)
            .send();

        let response = match tokio::time::timeout(self.connect_timeout, send).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) if e.is_builder() => {
                return Err(RelayError::Internal(anyhow::anyhow!("failed to build upstream request: {e}")));
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "upstream stream request failed");
                return Err(RelayError::UpstreamTransient(e.to_string()));
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.connect_timeout, "upstream did not respond in time");
                return Err(RelayError::UpstreamTransient(format!(
                    "no upstream response within {:?}",
                    self.connect_timeout
                )));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "upstream returned error");
            return Err(classify_status(status, &body));
        }

        let events = response.bytes_stream().eventsource().filter_map(|result| {
            let event = match result {
                Ok(event) => {
                    let data = event.data.trim();
                    if data.is_empty() {
                        None
                    } else {
                        match serde_json::from_str::<AnthropicStreamEvent>(data) {
                            Ok(stream_event) => stream_event.into_stream_event().map(Ok),
                            Err(e) => {
                                tracing::debug!(error = %e, "skipping unparseable Anthropic SSE event");
                                None
                            }
                        }
                    }
                }
                Err(e) => Some(Err(RelayError::StreamInterrupted(e.to_string()))),
            };

            async move { event }
        });

        Ok(Box::pin(events))
    }
}

/// Classify a non-2xx upstream response
///
/// 5xx is transient; every 4xx, including 429, is final.
fn classify_status(status: StatusCode, body: &str) -> RelayError {
    let message = serde_json::from_str::<AnthropicErrorResponse>(body).map_or_else(
        |_| {
            if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("unknown error").to_owned()
            } else {
                body.trim().to_owned()
            }
        },
        |response| response.error.message,
    );

    if status.is_server_error() {
        RelayError::UpstreamTransient(format!("upstream returned {status}: {message}"))
    } else {
        RelayError::UpstreamRejected {
            status: status.as_u16(),
            message,
        }
    }
}
