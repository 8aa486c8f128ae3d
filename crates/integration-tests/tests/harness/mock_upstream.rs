//! Mock Anthropic Messages API for integration tests
//!
//! Each request to `/v1/messages` is answered with the next scripted
//! `Reply`; the last reply repeats once the script runs out. Streamed
//! bodies report when they are dropped, which is how tests observe that
//! the relay let go of an upstream connection.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use bytes::Bytes;
use futures_util::stream;
use tokio_util::sync::CancellationToken;

/// Gap between trailing deltas on endless streams
const TRICKLE_INTERVAL: Duration = Duration::from_millis(20);

/// Text of each trailing delta on endless streams
const TRICKLE_TEXT: &str = ".";

/// Pause before cutting a stream so headers and deltas reach the relay first
const CUT_DELAY: Duration = Duration::from_millis(50);

/// Scripted answer to one upstream request
#[derive(Debug, Clone)]
pub enum Reply {
    /// Non-2xx response with an Anthropic error body
    Status(u16),
    /// Text deltas followed by `message_stop`
    Complete(Vec<String>),
    /// Text deltas, then the connection is cut without `message_stop`
    Dropped(Vec<String>),
    /// Text deltas followed by a trickle of `.` deltas that never ends
    Endless(Vec<String>),
    /// Text deltas, then silence with the connection held open
    Stalled(Vec<String>),
}

impl Reply {
    /// Completed stream of the given deltas
    pub fn complete(deltas: &[&str]) -> Self {
        Self::Complete(owned(deltas))
    }

    /// Stream cut after the given deltas
    pub fn dropped(deltas: &[&str]) -> Self {
        Self::Dropped(owned(deltas))
    }

    /// Stream that keeps trickling after the given deltas
    pub fn endless(deltas: &[&str]) -> Self {
        Self::Endless(owned(deltas))
    }

    /// Stream that goes quiet after the given deltas
    pub fn stalled(deltas: &[&str]) -> Self {
        Self::Stalled(owned(deltas))
    }
}

fn owned(deltas: &[&str]) -> Vec<String> {
    deltas.iter().map(|d| (*d).to_owned()).collect()
}

/// Mock upstream that returns scripted replies
pub struct MockUpstream {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

struct MockState {
    script: Mutex<VecDeque<Reply>>,
    last: Mutex<Reply>,
    event_delay: Duration,
    request_count: AtomicU32,
    closed_streams: AtomicU32,
    bodies: Mutex<Vec<serde_json::Value>>,
}

impl MockUpstream {
    /// Start a mock answering with `script`, in order
    pub async fn start(script: Vec<Reply>) -> anyhow::Result<Self> {
        Self::start_with_delay(script, Duration::ZERO).await
    }

    /// Start a mock that waits `event_delay` before each streamed event
    pub async fn start_with_delay(script: Vec<Reply>, event_delay: Duration) -> anyhow::Result<Self> {
        let last = script.last().cloned().unwrap_or_else(|| Reply::complete(&["pong"]));

        let state = Arc::new(MockState {
            script: Mutex::new(script.into()),
            last: Mutex::new(last),
            event_delay,
            request_count: AtomicU32::new(0),
            closed_streams: AtomicU32::new(0),
            bodies: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/v1/messages", routing::post(handle_messages))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL for configuring the mock as the upstream
    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// Number of upstream requests received
    pub fn request_count(&self) -> u32 {
        self.state.request_count.load(Ordering::SeqCst)
    }

    /// Number of streamed bodies that have been dropped
    pub fn closed_streams(&self) -> u32 {
        self.state.closed_streams.load(Ordering::SeqCst)
    }

    /// JSON bodies of every request received, in order
    pub fn bodies(&self) -> Vec<serde_json::Value> {
        self.state.bodies.lock().unwrap().clone()
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn handle_messages(State(state): State<Arc<MockState>>, Json(body): Json<serde_json::Value>) -> Response {
    state.request_count.fetch_add(1, Ordering::SeqCst);
    state.bodies.lock().unwrap().push(body);

    let reply = {
        let next = state.script.lock().unwrap().pop_front();
        match next {
            Some(reply) => {
                *state.last.lock().unwrap() = reply.clone();
                reply
            }
            None => state.last.lock().unwrap().clone(),
        }
    };

    match reply {
        Reply::Status(code) => error_response(code),
        Reply::Complete(deltas) => stream_response(&state, &deltas, Tail::Stop),
        Reply::Dropped(deltas) => stream_response(&state, &deltas, Tail::Cut),
        Reply::Endless(deltas) => stream_response(&state, &deltas, Tail::Trickle),
        Reply::Stalled(deltas) => stream_response(&state, &deltas, Tail::Silence),
    }
}

fn error_response(code: u16) -> Response {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let error_type = match code {
        400 => "invalid_request_error",
        401 => "authentication_error",
        429 => "rate_limit_error",
        529 => "overloaded_error",
        _ => "api_error",
    };

    let body = serde_json::json!({
        "type": "error",
        "error": { "type": error_type, "message": format!("mock upstream returned {code}") }
    });

    (status, Json(body)).into_response()
}

// -- Streamed bodies --

#[derive(Clone, Copy)]
enum Tail {
    Stop,
    Cut,
    Trickle,
    Silence,
}

enum Frame {
    Event(String),
    Cut,
    Trickle,
    Silence,
}

/// Counts the body as closed when the stream is dropped
struct CloseGuard(Arc<MockState>);

impl Drop for CloseGuard {
    fn drop(&mut self) {
        self.0.closed_streams.fetch_add(1, Ordering::SeqCst);
    }
}

struct BodyState {
    frames: VecDeque<Frame>,
    delay: Duration,
    _guard: CloseGuard,
}

fn stream_response(state: &Arc<MockState>, deltas: &[String], tail: Tail) -> Response {
    let mut frames = VecDeque::new();
    frames.push_back(Frame::Event(sse(
        "message_start",
        &serde_json::json!({"type": "message_start", "message": {"id": "msg_mock", "role": "assistant"}}),
    )));
    frames.push_back(Frame::Event(sse(
        "content_block_start",
        &serde_json::json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
    )));

    for text in deltas {
        frames.push_back(Frame::Event(text_delta(text)));
    }

    match tail {
        Tail::Stop => {
            frames.push_back(Frame::Event(sse(
                "content_block_stop",
                &serde_json::json!({"type": "content_block_stop", "index": 0}),
            )));
            frames.push_back(Frame::Event(sse("message_stop", &serde_json::json!({"type": "message_stop"}))));
        }
        Tail::Cut => frames.push_back(Frame::Cut),
        Tail::Trickle => frames.push_back(Frame::Trickle),
        Tail::Silence => frames.push_back(Frame::Silence),
    }

    let body_state = BodyState {
        frames,
        delay: state.event_delay,
        _guard: CloseGuard(Arc::clone(state)),
    };

    let body = stream::unfold(body_state, |mut body_state| async move {
        let frame = body_state.frames.pop_front()?;

        if !body_state.delay.is_zero() {
            tokio::time::sleep(body_state.delay).await;
        }

        let item = match frame {
            Frame::Event(text) => Ok(Bytes::from(text)),
            Frame::Cut => {
                tokio::time::sleep(CUT_DELAY).await;
                Err(std::io::Error::other("mock upstream cut the connection"))
            }
            Frame::Trickle => {
                tokio::time::sleep(TRICKLE_INTERVAL).await;
                body_state.frames.push_back(Frame::Trickle);
                Ok(Bytes::from(text_delta(TRICKLE_TEXT)))
            }
            Frame::Silence => return std::future::pending().await,
        };

        Some((item, body_state))
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(body))
        .unwrap()
}

fn text_delta(text: &str) -> String {
    sse(
        "content_block_delta",
        &serde_json::json!({
            "type": "content_block_delta",
            "index": 0,
            "delta": {"type": "text_delta", "text": text}
        }),
    )
}

fn sse(event: &str, data: &serde_json::Value) -> String {
    format!("event: {event}\ndata: {data}\n\n")
}
