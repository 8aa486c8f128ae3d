use std::time::Duration;

use relay_core::ChatRequest;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::consumer::{self, Deadline};
use crate::error::{ClientError, Result};
use crate::observer::{ConsumerState, StreamObserver, StreamOutcome};

/// Path of the relay's streaming endpoint
const CHAT_STREAM_PATH: &str = "/chat/stream";

/// Default overall limit on one streamed request
const DEFAULT_STREAM_TIMEOUT: Duration = Duration::from_secs(120);

/// HTTP client for the relay's streaming chat endpoint
#[derive(Debug, Clone)]
pub struct RelayClient {
    base_url: Url,
    http: reqwest::Client,
    stream_timeout: Option<Duration>,
}

impl RelayClient {
    /// Create a new client pointing at the given base URL
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| ClientError::Config(format!("invalid base URL: {e}")))?;

        if base_url.cannot_be_a_base() {
            return Err(ClientError::Config(format!("URL cannot be used as a base: {base_url}")));
        }

        Ok(Self {
            base_url,
            http: reqwest::Client::new(),
            stream_timeout: Some(DEFAULT_STREAM_TIMEOUT),
        })
    }

    /// Limit the total duration of each streamed request; `None` disables the limit
    #[must_use]
    pub fn with_stream_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stream_timeout = timeout;
        self
    }

    /// Use a preconfigured HTTP client
    #[must_use]
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Get the base URL
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Stream a completion, reporting progress to `observer`
    ///
    /// Runs until the relay finishes the stream, the request fails, the
    /// stream timeout passes, or `cancel` fires. On cancellation the
    /// connection is dropped before returning and no terminal state is
    /// reported to the observer.
    pub async fn stream<O>(&self, request: &ChatRequest, observer: &mut O, cancel: &CancellationToken) -> StreamOutcome
    where
        O: StreamObserver + ?Sized,
    {
        let deadline = self.stream_timeout.map(Deadline::after);
        let url = make_url(&self.base_url, CHAT_STREAM_PATH);

        observer.on_state(ConsumerState::Requesting);
        tracing::debug!(%url, "opening relay stream");

        let send = self.http.post(url).json(request).send();

        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return StreamOutcome::Cancelled { partial: String::new() },
            () = consumer::expired(deadline) => {
                let limit = deadline.map_or(Duration::ZERO, Deadline::limit);
                return consumer::fail(observer, ClientError::Timeout(limit), String::new());
            }
            response = send => response,
        };

        let response = match response {
            Ok(response) => response,
            Err(e) => return consumer::fail(observer, ClientError::Http(e), String::new()),
        };

        let response = match handle_error(response).await {
            Ok(response) => response,
            Err(e) => return consumer::fail(observer, e, String::new()),
        };

        observer.on_state(ConsumerState::Streaming);

        consumer::consume(response.bytes_stream(), observer, cancel, deadline).await
    }
}

/// Join `path` onto the base URL, keeping any base path prefix
fn make_url(base_url: &Url, path: &str) -> Url {
    let mut url = base_url.clone();
    let joined = format!("{}{path}", base_url.path().trim_end_matches('/'));
    url.set_path(&joined);
    url
}

/// Check an HTTP response for errors
async fn handle_error(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let (error_type, message) = parse_error_body(&body);

    Err(ClientError::Api {
        status: status.as_u16(),
        error_type,
        message,
    })
}

/// Parse an error response body into (type, message)
fn parse_error_body(body: &str) -> (String, String) {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        let error = &json["error"];
        let error_type = error["type"].as_str().unwrap_or("unknown").to_owned();
        let message = error["message"].as_str().unwrap_or(body).to_owned();
        (error_type, message)
    } else {
        ("unknown".to_owned(), body.to_owned())
    }
}
