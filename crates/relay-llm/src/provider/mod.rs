//! Upstream provider abstraction

pub mod anthropic;

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use relay_core::StreamEvent;

use crate::error::RelayError;
use crate::request::CompletionRequest;

pub use anthropic::AnthropicProvider;

/// Upstream events translated into relay events
///
/// An `Err` item means the transport failed after the stream was established.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, RelayError>> + Send>>;

/// Streaming completion backend
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human-readable provider name
    fn name(&self) -> &str;

    /// Establish a streaming completion
    ///
    /// Returns once the upstream has accepted the request. Failures at this
    /// point are classified as transient or rejected so the caller can decide
    /// whether to retry.
    async fn open_stream(&self, request: &CompletionRequest) -> Result<EventStream, RelayError>;
}
