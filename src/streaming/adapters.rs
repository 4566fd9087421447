//! # Stream Strategies
//!
//! One strategy per negotiated [`StreamFormat`], chosen once per request:
//!
//! - [`PassThroughStrategy`] (`vercel`): the upstream already speaks the
//!   output protocol, bytes are forwarded untouched.
//! - [`TranslateStrategy`] (`openai`): upstream SSE events are reassembled,
//!   parsed and run through the event converter.

use crate::{
    error::BridgeError,
    schemas::{StreamFormat, UpstreamChunk},
    streaming::{
        converter::convert_event,
        core::{OutputChunk, CONTENT_PREFIX},
        sse::{event_payloads, EventBuffer, EventPayload, Utf8StreamDecoder},
    },
};
use bytes::Bytes;
use tracing::{debug, warn};

/// Per-request state machine turning upstream fragments into output bytes.
pub trait StreamStrategy: Send {
    /// Strategy name for logging.
    fn name(&self) -> &'static str;

    /// Handle one upstream fragment, returning bytes to write in order.
    fn on_fragment(&mut self, fragment: Bytes) -> Vec<Bytes>;

    /// Handle upstream completion, flushing anything still buffered.
    fn on_complete(&mut self) -> Vec<Bytes>;

    /// Whether any content chunk has been seen so far.
    fn content_observed(&self) -> bool;

    /// Number of upstream events parsed so far.
    fn events_processed(&self) -> u64;
}

impl StreamFormat {
    /// The strategy serving this format.
    pub fn strategy(self) -> Box<dyn StreamStrategy> {
        match self {
            StreamFormat::Vercel => Box::new(PassThroughStrategy::new()),
            StreamFormat::OpenAi => Box::new(TranslateStrategy::new()),
        }
    }

    /// Whether responses carry the data-stream version header.
    pub fn advertises_data_stream(self) -> bool {
        matches!(self, StreamFormat::Vercel)
    }
}

/// Forwards upstream bytes unchanged, watching only for content lines.
#[derive(Debug, Default)]
pub struct PassThroughStrategy {
    decoder: Utf8StreamDecoder,
    /// First characters of the line currently being received.
    line_head: String,
    content_observed: bool,
    fragments: u64,
}

impl PassThroughStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    fn scan(&mut self, text: &str) {
        if self.content_observed {
            return;
        }
        for ch in text.chars() {
            if ch == '\n' {
                self.line_head.clear();
            } else if self.line_head.len() < CONTENT_PREFIX.len() {
                self.line_head.push(ch);
                if self.line_head == CONTENT_PREFIX {
                    self.content_observed = true;
                    return;
                }
            }
        }
    }
}

impl StreamStrategy for PassThroughStrategy {
    fn name(&self) -> &'static str {
        "pass-through"
    }

    fn on_fragment(&mut self, fragment: Bytes) -> Vec<Bytes> {
        self.fragments += 1;
        if !self.content_observed {
            let text = self.decoder.decode(&fragment);
            self.scan(&text);
        }
        vec![fragment]
    }

    fn on_complete(&mut self) -> Vec<Bytes> {
        Vec::new()
    }

    fn content_observed(&self) -> bool {
        self.content_observed
    }

    fn events_processed(&self) -> u64 {
        self.fragments
    }
}

/// Reassembles upstream SSE events and converts them to output chunks.
#[derive(Debug, Default)]
pub struct TranslateStrategy {
    decoder: Utf8StreamDecoder,
    buffer: EventBuffer,
    content_observed: bool,
    events_processed: u64,
}

impl TranslateStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Residual text not yet terminated by an event separator.
    pub fn pending(&self) -> &str {
        self.buffer.residual()
    }

    fn convert_events(&mut self, events: Vec<String>) -> Vec<Bytes> {
        let mut out = Vec::new();
        for event in &events {
            for payload in event_payloads(event) {
                let json = match payload {
                    EventPayload::Done => {
                        debug!("Upstream sent [DONE]");
                        continue;
                    }
                    EventPayload::Json(json) => json,
                };
                match serde_json::from_str::<UpstreamChunk>(json) {
                    Ok(chunk) => {
                        self.events_processed += 1;
                        for converted in convert_event(&chunk) {
                            match converted.to_bytes() {
                                Ok(bytes) => {
                                    self.content_observed |= converted.is_content();
                                    out.push(bytes);
                                }
                                Err(err) => warn!("Skipping unencodable '{}' chunk: {}", converted.prefix(), err),
                            }
                        }
                    }
                    Err(err) => {
                        let skipped = BridgeError::from(err);
                        warn!("Dropping upstream event ({}): {}", skipped.wire_message(), truncate(json, 200));
                    }
                }
            }
        }
        out
    }
}

impl StreamStrategy for TranslateStrategy {
    fn name(&self) -> &'static str {
        "translate"
    }

    fn on_fragment(&mut self, fragment: Bytes) -> Vec<Bytes> {
        let text = self.decoder.decode(&fragment);
        let events = self.buffer.push(&text);
        self.convert_events(events)
    }

    fn on_complete(&mut self) -> Vec<Bytes> {
        let tail = self.decoder.finish();
        let mut events = self.buffer.push(&tail);
        events.extend(self.buffer.finish());
        self.convert_events(events)
    }

    fn content_observed(&self) -> bool {
        self.content_observed
    }

    fn events_processed(&self) -> u64 {
        self.events_processed
    }
}

/// Encoded terminal error chunk.
pub(crate) fn error_bytes(err: &BridgeError) -> Option<Bytes> {
    OutputChunk::error(err)
        .to_bytes()
        .map_err(|encode_err| warn!("Failed to encode error chunk: {}", encode_err))
        .ok()
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}
