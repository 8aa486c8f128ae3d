//! Consumer states, observers, and outcomes

use tokio::sync::watch;

use crate::error::ClientError;

/// Lifecycle of one streamed request
///
/// `Idle → Requesting → Streaming → {Completed | Failed}`, with
/// `Requesting → Failed` when the request cannot be established. A
/// cancelled request stops where it was; no terminal state is reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConsumerState {
    #[default]
    Idle,
    Requesting,
    Streaming,
    Completed,
    Failed,
}

/// Receives progress of a streamed request, in order, on the consumer task
pub trait StreamObserver: Send {
    /// Called on every state transition
    fn on_state(&mut self, _state: ConsumerState) {}

    /// Called after `delta` has been appended; `accumulated` is the full text so far
    fn on_delta(&mut self, _delta: &str, _accumulated: &str) {}
}

/// Observer that ignores every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl StreamObserver for NoopObserver {}

/// Point-in-time view of a streamed response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseSnapshot {
    pub state: ConsumerState,
    pub text: String,
}

/// Observer publishing `ResponseSnapshot`s through a watch channel
///
/// Suits a UI that renders the latest snapshot whenever it changes.
#[derive(Debug)]
pub struct WatchObserver {
    sender: watch::Sender<ResponseSnapshot>,
}

impl WatchObserver {
    /// Create an observer and the receiver that follows it
    pub fn new() -> (Self, watch::Receiver<ResponseSnapshot>) {
        let (sender, receiver) = watch::channel(ResponseSnapshot::default());
        (Self { sender }, receiver)
    }
}

impl StreamObserver for WatchObserver {
    fn on_state(&mut self, state: ConsumerState) {
        self.sender.send_modify(|snapshot| {
            if state == ConsumerState::Requesting {
                snapshot.text.clear();
            }
            snapshot.state = state;
        });
    }

    fn on_delta(&mut self, delta: &str, _accumulated: &str) {
        self.sender.send_modify(|snapshot| snapshot.text.push_str(delta));
    }
}

/// How a streamed request ended
#[derive(Debug)]
pub enum StreamOutcome {
    /// `Done` received, or the stream closed cleanly
    Completed {
        /// Full answer text
        text: String,
    },
    /// Request failed; `partial` holds whatever arrived first
    Failed {
        error: ClientError,
        partial: String,
    },
    /// Caller abandoned the request
    Cancelled {
        partial: String,
    },
}

impl StreamOutcome {
    /// Text received, complete or not
    pub fn text(&self) -> &str {
        match self {
            Self::Completed { text } => text,
            Self::Failed { partial, .. } | Self::Cancelled { partial } => partial,
        }
    }

    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Failure reason, if the request failed
    pub const fn error(&self) -> Option<&ClientError> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}
