//! Incremental line framing for relay event streams
//!
//! Transports deliver bytes in arbitrary chunks: a chunk may hold several
//! events, end in the middle of a line, or split a multi-byte character.
//! `EventFramer` keeps the unterminated tail between calls and only decodes
//! complete lines. Since `\n` never occurs inside a UTF-8 sequence, a
//! complete line is always a complete run of characters.

use crate::event::{DATA_PREFIX, DecodeError, StreamEvent};

/// Longest unterminated line held back before it is rejected
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Reassembles `StreamEvent`s from raw body chunks
#[derive(Debug, Default)]
pub struct EventFramer {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already known to hold no line break
    scanned: usize,
    /// Skipping the rest of an over-long line
    discarding: bool,
    terminated: bool,
}

impl EventFramer {
    /// Create an empty framer
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk of body bytes
    ///
    /// Returns every event completed by this chunk, in order. Once a
    /// terminal event has been produced the remainder of the input, including
    /// the rest of this chunk, is discarded.
    ///
    /// A line that grows past `MAX_LINE_BYTES` without a line break yields a
    /// single `DecodeError`; its remaining bytes are skipped and framing
    /// resumes on the next line.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<StreamEvent, DecodeError>> {
        if self.terminated {
            return Vec::new();
        }

        let chunk = if self.discarding {
            match chunk.iter().position(|b| *b == b'\n') {
                Some(offset) => {
                    self.discarding = false;
                    &chunk[offset + 1..]
                }
                None => return Vec::new(),
            }
        } else {
            chunk
        };

        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut start = 0;
        let mut scan_from = self.scanned;

        while let Some(offset) = self.buffer[scan_from..].iter().position(|b| *b == b'\n') {
            let end = scan_from + offset;
            let decoded = decode_line(&self.buffer[start..end]);
            start = end + 1;
            scan_from = start;

            if let Some(result) = decoded {
                let terminal = matches!(&result, Ok(event) if event.is_terminal());
                events.push(result);

                if terminal {
                    self.terminated = true;
                    self.buffer.clear();
                    self.scanned = 0;
                    return events;
                }
            }
        }

        self.buffer.drain(..start);

        if self.buffer.len() > MAX_LINE_BYTES {
            events.push(Err(DecodeError(format!("event line exceeds {MAX_LINE_BYTES} bytes"))));
            self.buffer.clear();
            self.discarding = true;
        }

        self.scanned = self.buffer.len();
        events
    }

    /// Flush a final line that arrived without a trailing newline
    pub fn finish(&mut self) -> Option<Result<StreamEvent, DecodeError>> {
        if self.terminated || self.discarding || self.buffer.is_empty() {
            return None;
        }

        let line = std::mem::take(&mut self.buffer);
        self.scanned = 0;

        let decoded = decode_line(&line);
        if matches!(&decoded, Some(Ok(event)) if event.is_terminal()) {
            self.terminated = true;
        }
        decoded
    }

    /// Whether a terminal event has been produced
    pub const fn is_terminated(&self) -> bool {
        self.terminated
    }
}

/// Decode a single line without its terminating `\n`
///
/// Lines without the data prefix (blank separators, `:` keep-alive
/// comments, `event:` fields) yield `None`.
fn decode_line(line: &[u8]) -> Option<Result<StreamEvent, DecodeError>> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);

    let field = DATA_PREFIX.trim_end().as_bytes();
    let payload = line.strip_prefix(field)?;
    let payload = payload.strip_prefix(b" ").unwrap_or(payload);

    let text = match std::str::from_utf8(payload) {
        Ok(text) => text,
        Err(e) => return Some(Err(DecodeError(format!("invalid utf-8: {e}")))),
    };

    StreamEvent::from_payload(text).transpose()
}
