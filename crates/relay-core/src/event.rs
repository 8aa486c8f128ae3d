//! Relay stream events and their `data: ` line encoding

use serde::{Deserialize, Serialize};

/// Prefix that marks an event line
pub const DATA_PREFIX: &str = "data: ";

/// Payload of the line that terminates a stream
pub const DONE_MARKER: &str = "[DONE]";

/// Frame type tag for content deltas
const CONTENT_DELTA_TYPE: &str = "content_block_delta";

/// Frame type tag for errors
const ERROR_TYPE: &str = "error";

/// Error type reported inside an error frame
const STREAM_INTERRUPTED: &str = "stream_interrupted";

/// Event emitted by the relay and consumed in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Incremental fragment of the answer text
    ContentDelta {
        /// Text to append
        text: String,
    },
    /// Stream completed normally
    Done,
    /// Stream failed; no further events follow
    Error {
        /// Failure reason
        message: String,
    },
}

/// Event payload that could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed event payload: {0}")]
pub struct DecodeError(pub String);

/// JSON frame carried after the `data: ` prefix
#[derive(Debug, Serialize, Deserialize)]
struct WireFrame {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    frame_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    delta: Option<WireDelta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<WireError>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireDelta {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireError {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    error_type: Option<String>,
    #[serde(default)]
    message: String,
}

impl StreamEvent {
    /// Build a content delta
    pub fn delta(text: impl Into<String>) -> Self {
        Self::ContentDelta { text: text.into() }
    }

    /// Build an error event
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Whether no further events may follow this one
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error { .. })
    }

    /// Encode the payload that follows the `data: ` prefix
    pub fn to_payload(&self) -> String {
        let frame = match self {
            Self::Done => return DONE_MARKER.to_owned(),
            Self::ContentDelta { text } => WireFrame {
                frame_type: Some(CONTENT_DELTA_TYPE.to_owned()),
                delta: Some(WireDelta {
                    text: Some(text.clone()),
                }),
                error: None,
            },
            Self::Error { message } => WireFrame {
                frame_type: Some(ERROR_TYPE.to_owned()),
                delta: None,
                error: Some(WireError {
                    error_type: Some(STREAM_INTERRUPTED.to_owned()),
                    message: message.clone(),
                }),
            },
        };

        // Serializing plain strings and options cannot fail
        serde_json::to_string(&frame).unwrap_or_default()
    }

    /// Encode a complete event line, including the blank separator line
    pub fn to_line(&self) -> String {
        format!("{DATA_PREFIX}{}\n\n", self.to_payload())
    }

    /// Decode the payload of a `data: ` line
    ///
    /// Returns `Ok(None)` for well-formed frames that carry nothing relevant
    /// to reconstructing the answer.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError` when the payload is not valid JSON
    pub fn from_payload(payload: &str) -> Result<Option<Self>, DecodeError> {
        let payload = payload.trim();
        if payload == DONE_MARKER {
            return Ok(Some(Self::Done));
        }

        let frame: WireFrame = serde_json::from_str(payload).map_err(|e| DecodeError(e.to_string()))?;

        if let Some(error) = frame.error {
            return Ok(Some(Self::Error {
                message: error.message,
            }));
        }

        if frame.frame_type.as_deref() == Some(ERROR_TYPE) {
            return Ok(Some(Self::error("unspecified relay error")));
        }

        Ok(frame.delta.and_then(|d| d.text).map(|text| Self::ContentDelta { text }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_payload_is_compact_json() {
        let payload = StreamEvent::delta("pong").to_payload();
        assert_eq!(payload, r#"{"type":"content_block_delta","delta":{"text":"pong"}}"#);
    }

    #[test]
    fn done_encodes_as_marker() {
        assert_eq!(StreamEvent::Done.to_line(), "data: [DONE]\n\n");
    }

    #[test]
    fn error_payload_carries_message() {
        let payload = StreamEvent::error("upstream went away").to_payload();
        let json: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["error"]["type"], "stream_interrupted");
        assert_eq!(json["error"]["message"], "upstream went away");
    }

    #[test]
    fn decodes_untyped_delta() {
        let event = StreamEvent::from_payload(r#"{"delta":{"text":"pong"}}"#).unwrap();
        assert_eq!(event, Some(StreamEvent::delta("pong")));
    }

    #[test]
    fn decodes_what_it_encodes() {
        for event in [
            StreamEvent::delta("héllo 🌍"),
            StreamEvent::Done,
            StreamEvent::error("boom"),
        ] {
            let decoded = StreamEvent::from_payload(&event.to_payload()).unwrap();
            assert_eq!(decoded, Some(event));
        }
    }

    #[test]
    fn irrelevant_frame_is_ignored() {
        let event = StreamEvent::from_payload(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(event, None);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(StreamEvent::from_payload("{not json").is_err());
    }

    #[test]
    fn terminal_events() {
        assert!(StreamEvent::Done.is_terminal());
        assert!(StreamEvent::error("x").is_terminal());
        assert!(!StreamEvent::delta("x").is_terminal());
    }
}
