//! Relay service for streamed completions
//!
//! Validates chat requests, opens a streaming call to the upstream provider
//! with bounded retry, and re-emits the upstream events to the caller as
//! relay `data: ` frames over SSE.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod error;
pub mod handler;
pub mod limiter;
pub mod protocol;
pub mod provider;
pub mod relay;
pub mod request;
pub mod retry;

pub use error::RelayError;
pub use handler::relay_router;
pub use limiter::ConnectionLimiter;
pub use provider::{EventStream, Provider};
pub use relay::{RelayState, RelayStream};
pub use request::CompletionRequest;
pub use retry::RetryPolicy;
