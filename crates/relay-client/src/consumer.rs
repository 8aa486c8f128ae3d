//! The read loop that turns a body stream into an accumulated response
//!
//! Each iteration awaits exactly one body chunk, so the loop depth stays
//! constant however long the stream runs. Cancellation and the overall
//! deadline are checked before every chunk and between events.

use std::fmt::Display;
use std::pin::pin;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use relay_core::{DecodeError, EventFramer, StreamEvent};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::ClientError;
use crate::observer::{ConsumerState, StreamObserver, StreamOutcome};

/// Overall limit on one streamed request
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    at: Instant,
    limit: Duration,
}

impl Deadline {
    pub(crate) fn after(limit: Duration) -> Self {
        Self {
            at: Instant::now() + limit,
            limit,
        }
    }

    pub(crate) const fn limit(self) -> Duration {
        self.limit
    }
}

/// Resolves when `deadline` passes, never when there is none
pub(crate) async fn expired(deadline: Option<Deadline>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.at).await,
        None => std::future::pending().await,
    }
}

enum Step {
    Continue,
    Completed,
    Failed(ClientError),
}

/// Consume `body` until a terminal event, the end of the body, a transport
/// failure, cancellation, or the deadline
pub(crate) async fn consume<S, B, E, O>(
    body: S,
    observer: &mut O,
    cancel: &CancellationToken,
    deadline: Option<Deadline>,
) -> StreamOutcome
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
    O: StreamObserver + ?Sized,
{
    let mut body = pin!(body);
    let mut framer = EventFramer::new();
    let mut text = String::new();

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return StreamOutcome::Cancelled { partial: text },
            () = expired(deadline) => {
                let limit = deadline.map_or(Duration::ZERO, Deadline::limit);
                return fail(observer, ClientError::Timeout(limit), text);
            }
            next = body.next() => next,
        };

        let ended = next.is_none();
        let results = match next {
            Some(Ok(chunk)) => framer.push(chunk.as_ref()),
            Some(Err(e)) => return fail(observer, ClientError::StreamInterrupted(e.to_string()), text),
            None => framer.finish().into_iter().collect(),
        };

        for result in results {
            if cancel.is_cancelled() {
                return StreamOutcome::Cancelled { partial: text };
            }

            match apply(result, &mut text, observer) {
                Step::Continue => {}
                Step::Completed => return complete(observer, text),
                Step::Failed(error) => return fail(observer, error, text),
            }
        }

        if ended {
            // Closing without an error frame counts as success
            return complete(observer, text);
        }
    }
}

fn apply<O>(result: Result<StreamEvent, DecodeError>, text: &mut String, observer: &mut O) -> Step
where
    O: StreamObserver + ?Sized,
{
    match result {
        Ok(StreamEvent::ContentDelta { text: delta }) => {
            text.push_str(&delta);
            observer.on_delta(&delta, text);
            Step::Continue
        }
        Ok(StreamEvent::Done) => Step::Completed,
        Ok(StreamEvent::Error { message }) => Step::Failed(ClientError::StreamInterrupted(message)),
        Err(e) => {
            tracing::warn!(error = %e, "skipping malformed stream event");
            Step::Continue
        }
    }
}

fn complete<O: StreamObserver + ?Sized>(observer: &mut O, text: String) -> StreamOutcome {
    observer.on_state(ConsumerState::Completed);
    StreamOutcome::Completed { text }
}

/// Report failure, keeping whatever text already arrived
pub(crate) fn fail<O: StreamObserver + ?Sized>(observer: &mut O, error: ClientError, partial: String) -> StreamOutcome {
    tracing::debug!(error = %error, partial_len = partial.len(), "stream failed");
    observer.on_state(ConsumerState::Failed);
    StreamOutcome::Failed { error, partial }
}
