use std::time::Duration;

/// Client-specific result type
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors from the relay client
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Request could not be sent or its response headers were not received
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Relay rejected the request
    #[error("{status} {error_type}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error type identifier
        error_type: String,
        /// Human-readable error message
        message: String,
    },

    /// Stream failed after it started; partial text is kept
    #[error("stream interrupted: {0}")]
    StreamInterrupted(String),

    /// Stream did not finish within the configured limit
    #[error("stream did not finish within {0:?}")]
    Timeout(Duration),

    /// Search submitted without any text
    #[error("query must not be empty")]
    EmptyQuery,

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}
