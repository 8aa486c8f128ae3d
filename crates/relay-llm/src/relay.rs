//! Relay stream assembly
//!
//! `RelayState::open_stream` validates the request, takes a connection slot,
//! establishes the upstream stream with retry, and wraps it so that:
//! - at most one terminal event is emitted and nothing follows it
//! - an upstream failure after the stream opened becomes a single `Error`
//! - dropping the stream drops the upstream connection and frees the slot

use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{Stream, StreamExt};
use relay_config::{Config, RelayConfig};
use relay_core::{ChatRequest, HttpError, StreamEvent};
use relay_telemetry::RelayMetrics;
use tokio::sync::OwnedSemaphorePermit;

use crate::error::RelayError;
use crate::limiter::ConnectionLimiter;
use crate::provider::{AnthropicProvider, EventStream, Provider};
use crate::request::CompletionRequest;
use crate::retry::{self, RetryPolicy};

/// Events relayed to one caller, ending with `Done` or `Error`
pub type RelayStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// Shared state for relay route handlers
#[derive(Clone)]
pub struct RelayState {
    inner: Arc<RelayStateInner>,
}

struct RelayStateInner {
    provider: Arc<dyn Provider>,
    limiter: ConnectionLimiter,
    retry: RetryPolicy,
    relay: RelayConfig,
    idle_timeout: Duration,
    metrics: RelayMetrics,
}

impl RelayState {
    /// Build state backed by the configured Anthropic upstream
    ///
    /// # Errors
    ///
    /// Returns an error if the upstream client cannot be constructed
    pub fn from_config(config: &Config) -> Result<Self, RelayError> {
        let provider = AnthropicProvider::new(&config.upstream)?;
        Ok(Self::new(Arc::new(provider), &config.relay, config.upstream.idle_timeout))
    }

    /// Build state around an arbitrary provider
    pub fn new(provider: Arc<dyn Provider>, relay: &RelayConfig, idle_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(RelayStateInner {
                provider,
                limiter: ConnectionLimiter::new(relay.max_concurrent_streams, relay.queue_timeout),
                retry: RetryPolicy::from(&relay.retry),
                relay: relay.clone(),
                idle_timeout,
                metrics: RelayMetrics::new(),
            }),
        }
    }

    /// Connection limiter shared by every request
    pub fn limiter(&self) -> &ConnectionLimiter {
        &self.inner.limiter
    }

    /// Validate `request` and open a relayed stream
    ///
    /// Nothing is streamed unless the upstream accepted the request, so
    /// failures here carry no partial content.
    pub async fn open_stream(&self, request: ChatRequest) -> Result<RelayStream, RelayError> {
        let accepted_at = Instant::now();

        match self.establish(request).await {
            Ok((upstream, permit)) => {
                let inner = &self.inner;
                inner.metrics.stream_opened();

                Ok(relay_stream(RelayStreamState {
                    upstream,
                    idle_timeout: inner.idle_timeout,
                    accepted_at,
                    first_delta_seen: false,
                    finished: false,
                    guard: StreamGuard {
                        _permit: permit,
                        metrics: inner.metrics.clone(),
                        opened_at: Instant::now(),
                        outcome: "cancelled",
                    },
                }))
            }
            Err(e) => {
                tracing::warn!(error = %e, "relay request failed before streaming");
                self.inner.metrics.record_request(e.outcome());
                Err(e)
            }
        }
    }

    async fn establish(&self, request: ChatRequest) -> Result<(EventStream, OwnedSemaphorePermit), RelayError> {
        let inner = &*self.inner;

        let request = CompletionRequest::from_chat(request, &inner.relay)?;
        let permit = inner.limiter.acquire().await?;
        let provider = &inner.provider;

        let upstream = retry::execute_with_retry(
            &inner.retry,
            |attempt| {
                tracing::debug!(provider = provider.name(), attempt, "opening upstream stream");
                provider.open_stream(&request)
            },
            tokio::time::sleep,
            |attempt, delay, error| {
                tracing::warn!(
                    provider = provider.name(),
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %error,
                    "transient upstream failure, retrying"
                );
                inner.metrics.record_retry();
            },
        )
        .await?;

        Ok((upstream, permit))
    }
}

/// Releases the connection slot and records the stream outcome on drop
struct StreamGuard {
    _permit: OwnedSemaphorePermit,
    metrics: RelayMetrics,
    opened_at: Instant,
    outcome: &'static str,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        if self.outcome == "cancelled" {
            tracing::info!("caller went away, upstream stream released");
        }

        self.metrics.stream_closed(self.opened_at, self.outcome);
        self.metrics.record_request(self.outcome);
    }
}

struct RelayStreamState {
    upstream: EventStream,
    idle_timeout: Duration,
    accepted_at: Instant,
    first_delta_seen: bool,
    finished: bool,
    guard: StreamGuard,
}

fn relay_stream(state: RelayStreamState) -> RelayStream {
    Box::pin(futures_util::stream::unfold(state, |mut state| async move {
        if state.finished {
            return None;
        }

        let event = match tokio::time::timeout(state.idle_timeout, state.upstream.next()).await {
            Ok(Some(Ok(event))) => event,
            Ok(Some(Err(e))) => StreamEvent::error(e.client_message()),
            Ok(None) => StreamEvent::error("upstream closed the stream before completion"),
            Err(_) => StreamEvent::error(format!("no upstream event within {:?}", state.idle_timeout)),
        };

        match &event {
            StreamEvent::ContentDelta { .. } => {
                if !state.first_delta_seen {
                    state.first_delta_seen = true;
                    state.guard.metrics.record_first_token(state.accepted_at);
                }
            }
            StreamEvent::Done => {
                state.finished = true;
                state.guard.outcome = "completed";
            }
            StreamEvent::Error { message } => {
                tracing::warn!(error = %message, "relayed stream interrupted");
                state.finished = true;
                state.guard.outcome = "interrupted";
            }
        }

        Some((event, state))
    }))
}
