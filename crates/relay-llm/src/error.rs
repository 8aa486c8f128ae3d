use http::StatusCode;
use relay_core::HttpError;
use thiserror::Error;

/// Errors produced while relaying a completion
#[derive(Debug, Error)]
pub enum RelayError {
    /// Request body failed validation; never retried
    #[error("invalid request: {0}")]
    Validation(String),

    /// Every upstream slot is taken and the queue wait expired
    #[error("relay is at capacity, retry shortly")]
    Overloaded,

    /// Upstream refused the request with a non-retryable status
    #[error("upstream rejected the request ({status}): {message}")]
    UpstreamRejected {
        /// Upstream HTTP status
        status: u16,
        /// Upstream error message
        message: String,
    },

    /// Transient failures persisted past the retry ceiling
    #[error("upstream unavailable after {attempts} attempts: {last_error}")]
    UpstreamUnavailable {
        /// Attempts made, including the first
        attempts: u32,
        /// Failure reported by the final attempt
        last_error: String,
    },

    /// Connection failure, timeout, or 5xx while establishing the stream
    #[error("upstream error: {0}")]
    UpstreamTransient(String),

    /// Upstream failed after the stream was established
    #[error("stream interrupted: {0}")]
    StreamInterrupted(String),

    /// Unexpected internal error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl RelayError {
    /// Whether establishing the stream may be attempted again
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::UpstreamTransient(_))
    }

    /// Label recorded on `relay.request.count`
    pub const fn outcome(&self) -> &'static str {
        match self {
            Self::Validation(_) => "invalid",
            Self::Overloaded => "overloaded",
            Self::UpstreamRejected { .. } => "rejected",
            Self::UpstreamUnavailable { .. } | Self::UpstreamTransient(_) => "unavailable",
            Self::StreamInterrupted(_) => "interrupted",
            Self::Internal(_) => "internal",
        }
    }
}

impl HttpError for RelayError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Overloaded | Self::UpstreamUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::UpstreamRejected { .. } | Self::UpstreamTransient(_) | Self::StreamInterrupted(_) => {
                StatusCode::BAD_GATEWAY
            }
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::Validation(_) => "invalid_request_error",
            Self::Overloaded => "overloaded_error",
            Self::UpstreamRejected { .. } => "upstream_rejected",
            Self::UpstreamUnavailable { .. } => "upstream_unavailable",
            Self::UpstreamTransient(_) => "upstream_error",
            Self::StreamInterrupted(_) => "stream_interrupted",
            Self::Internal(_) => "internal_error",
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::Internal(_) => "an internal error occurred".to_owned(),
            other => other.to_string(),
        }
    }
}
