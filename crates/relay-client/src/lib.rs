//! Stream consumer for the relay
//!
//! `RelayClient` posts a chat request and reconstructs the answer from the
//! relayed event stream, reporting progress to a `StreamObserver`. `Session`
//! layers interactive search on top: one active stream at a time, with
//! completed searches recorded in a `LocalStore`.

#![allow(clippy::must_use_candidate)]

mod client;
mod consumer;
mod error;
mod observer;
mod session;
mod store;

pub use client::RelayClient;
pub use error::{ClientError, Result};
pub use observer::{ConsumerState, NoopObserver, ResponseSnapshot, StreamObserver, StreamOutcome, WatchObserver};
pub use relay_core::ChatRequest;
pub use session::{SearchHandle, Session};
pub use store::{HistoryEntry, LocalStore, SavedResponse, StoreError};
