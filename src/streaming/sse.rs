//! # SSE Reassembly
//!
//! Upstream bytes arrive in arbitrary fragments. [`Utf8StreamDecoder`] turns
//! them into text without splitting multi-byte characters, and
//! [`EventBuffer`] cuts that text into complete `\n\n`-separated events.

use std::mem;

/// Separator between two SSE events.
pub const EVENT_SEPARATOR: &str = "\n\n";

/// Sentinel some upstreams send as the last `data:` payload.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Incremental UTF-8 decoder.
///
/// Bytes of a character split across fragments are held until the rest
/// arrives. Invalid sequences decode to U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a fragment, carrying an incomplete trailing character over.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let mut buffered = mem::take(&mut self.pending);
        buffered.extend_from_slice(bytes);

        let mut out = String::with_capacity(buffered.len());
        let mut input = buffered.as_slice();
        while !input.is_empty() {
            match std::str::from_utf8(input) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(err) => {
                    let (valid, rest) = input.split_at(err.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            input = &rest[len..];
                        }
                        None => {
                            self.pending = rest.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush whatever is still pending at end of stream.
    pub fn finish(&mut self) -> String {
        let pending = mem::take(&mut self.pending);
        String::from_utf8_lossy(&pending).into_owned()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

/// Text accumulated between event boundaries.
///
/// Only text after the last processed separator is ever retained, so a JSON
/// payload straddling two fragments stays intact until its event completes.
#[derive(Debug, Default)]
pub struct EventBuffer {
    buffer: String,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append text and return every event it completed, in order.
    pub fn push(&mut self, text: &str) -> Vec<String> {
        self.buffer.push_str(text);
        let Some(last) = self.buffer.rfind(EVENT_SEPARATOR) else {
            return Vec::new();
        };
        let residual = self.buffer.split_off(last + EVENT_SEPARATOR.len());
        let complete = mem::replace(&mut self.buffer, residual);
        split_events(&complete)
    }

    /// Drain the residual text at end of stream, separator or not.
    pub fn finish(&mut self) -> Vec<String> {
        let residual = mem::take(&mut self.buffer);
        split_events(&residual)
    }

    pub fn residual(&self) -> &str {
        &self.buffer
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.trim().is_empty()
    }
}

fn split_events(text: &str) -> Vec<String> {
    text.split(EVENT_SEPARATOR)
        .filter(|event| !event.trim().is_empty())
        .map(str::to_string)
        .collect()
}

/// A `data:` payload found inside an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventPayload<'a> {
    /// Text that looks like a JSON object and should be parsed.
    Json(&'a str),
    /// The `[DONE]` sentinel.
    Done,
}

/// Extract the `data:` payloads of one event.
///
/// Each `data:` line is its own payload. Lines that are neither a JSON object
/// nor the sentinel (`event:`, `id:`, comments, plain text) are ignored.
pub fn event_payloads(event: &str) -> Vec<EventPayload<'_>> {
    event
        .lines()
        .filter_map(|line| line.trim_end_matches('\r').strip_prefix("data:"))
        .map(str::trim)
        .filter_map(|payload| {
            if payload == DONE_SENTINEL {
                Some(EventPayload::Done)
            } else if payload.starts_with('{') {
                Some(EventPayload::Json(payload))
            } else {
                None
            }
        })
        .collect()
}
