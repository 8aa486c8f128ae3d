//! Anthropic Messages API wire types, streaming subset

use relay_core::StreamEvent;
use serde::{Deserialize, Serialize};

use crate::request::CompletionRequest;

/// Streaming request body for `POST /messages`
#[derive(Debug, Clone, Serialize)]
pub struct AnthropicRequest {
    /// Model identifier
    pub model: String,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// System prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Sampling temperature
    pub temperature: f64,
    /// Conversation messages
    pub messages: Vec<AnthropicMessage>,
    /// Always `true` for relayed requests
    pub stream: bool,
}

impl AnthropicRequest {
    /// Build a single-turn streaming request for `model`
    pub fn streaming(model: &str, request: &CompletionRequest) -> Self {
        Self {
            model: model.to_owned(),
            max_tokens: request.max_tokens,
            system: request.system_prompt.clone(),
            temperature: request.temperature,
            messages: vec![AnthropicMessage {
                role: "user".to_owned(),
                content: request.prompt.clone(),
            }],
            stream: true,
        }
    }
}

/// Plain-text message
#[derive(Debug, Clone, Serialize)]
pub struct AnthropicMessage {
    /// `user` or `assistant`
    pub role: String,
    /// Message text
    pub content: String,
}

/// Anthropic SSE event payloads
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicStreamEvent {
    /// Stream started
    MessageStart,
    /// New content block started
    ContentBlockStart {
        /// Block index
        index: u32,
    },
    /// Incremental content within a block
    ContentBlockDelta {
        /// Block index
        index: u32,
        /// Delta content
        delta: AnthropicStreamDelta,
    },
    /// Content block finished
    ContentBlockStop {
        /// Block index
        index: u32,
    },
    /// Stop reason and usage update
    MessageDelta,
    /// Stream completed
    MessageStop,
    /// Keep-alive
    Ping,
    /// Upstream failure reported mid-stream
    Error {
        /// Error details
        error: AnthropicErrorDetail,
    },
}

/// Delta content in a `content_block_delta` event
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicStreamDelta {
    /// Incremental text
    TextDelta {
        /// Text fragment
        text: String,
    },
    /// Any non-text delta (tool input, thinking)
    #[serde(other)]
    Other,
}

/// Anthropic error response body
#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicErrorResponse {
    /// Error details
    pub error: AnthropicErrorDetail,
}

/// Anthropic error detail
#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicErrorDetail {
    /// Error type
    #[serde(rename = "type")]
    pub error_type: String,
    /// Error message
    pub message: String,
}

impl AnthropicStreamEvent {
    /// Translate into a relay event, or `None` when irrelevant to the answer text
    pub fn into_stream_event(self) -> Option<StreamEvent> {
        match self {
            Self::ContentBlockDelta {
                delta: AnthropicStreamDelta::TextDelta { text },
                ..
            } => Some(StreamEvent::ContentDelta { text }),
            Self::MessageStop => Some(StreamEvent::Done),
            Self::Error { error } => Some(StreamEvent::error(format!("{}: {}", error.error_type, error.message))),
            Self::MessageStart
            | Self::ContentBlockStart { .. }
            | Self::ContentBlockDelta { .. }
            | Self::ContentBlockStop { .. }
            | Self::MessageDelta
            | Self::Ping => None,
        }
    }
}
