//! Wire types shared by the relay service and its stream consumers
//!
//! The relay re-emits upstream completions as `data: ` lines carrying a
//! compact JSON frame, terminated by `data: [DONE]`. This crate owns that
//! encoding, the incremental framer that reassembles it from arbitrary
//! byte chunks, and the request body both sides agree on.

#![allow(clippy::must_use_candidate)]

mod error;
pub mod event;
pub mod framing;
pub mod request;

pub use error::HttpError;
pub use event::{DATA_PREFIX, DONE_MARKER, DecodeError, StreamEvent};
pub use framing::EventFramer;
pub use request::ChatRequest;
