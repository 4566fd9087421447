//! # Output Protocol
//!
//! The client-facing data-stream protocol. Every chunk is one line of the form
//! `<prefix>:<json>\n`, where the single-character prefix selects the kind:
//!
//! | prefix | kind            | payload                               |
//! |--------|-----------------|---------------------------------------|
//! | `0`    | content delta   | JSON string                           |
//! | `h`    | source          | [`SourceDescriptor`] object           |
//! | `2`    | structured data | array of [`StructuredData`]           |
//! | `d`    | finish          | [`FinishMetadata`] object             |
//! | `3`    | error           | JSON string, `<CODE>: <message>` form |

use crate::error::BridgeError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Header announcing the data-stream protocol version to clients.
pub const DATA_STREAM_HEADER: &str = "x-vercel-ai-data-stream";
pub const DATA_STREAM_VERSION: &str = "v1";

/// Prefix of content chunks, used to detect content in pass-through streams.
pub const CONTENT_PREFIX: &str = "0:";

/// A source attached to the answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "sourceType", rename_all = "lowercase")]
pub enum SourceDescriptor {
    Url {
        id: String,
        url: Option<String>,
        title: Option<String>,
        domain: Option<String>,
    },
    Chart {
        #[serde(default)]
        id: Value,
        #[serde(default)]
        metric: Value,
        #[serde(default)]
        dataset: Value,
        #[serde(default)]
        entities: Value,
        #[serde(default)]
        start: Value,
        #[serde(default)]
        end: Value,
    },
}

/// Structured payload bundling every citation or chart of a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StructuredData {
    CitationData {
        #[serde(rename = "traceId")]
        trace_id: Option<String>,
        citations: Vec<Value>,
    },
    ChartData {
        #[serde(rename = "traceId")]
        trace_id: Option<String>,
        charts: Vec<Value>,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishMetadata {
    pub finish_reason: String,
    pub trace_id: Option<String>,
    /// Always zero: the upstream stream carries no token counts.
    pub usage: TokenUsage,
}

/// One line of the output protocol.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputChunk {
    Content(String),
    Source(SourceDescriptor),
    Data(Vec<StructuredData>),
    Finish(FinishMetadata),
    Error(String),
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("line has no '<prefix>:' marker")]
    MissingPrefix,
    #[error("unknown chunk prefix '{0}'")]
    UnknownPrefix(String),
    #[error("invalid chunk payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl OutputChunk {
    /// Terminal error chunk for a bridge error.
    pub fn error(err: &BridgeError) -> Self {
        OutputChunk::Error(err.wire_message())
    }

    pub fn prefix(&self) -> char {
        match self {
            OutputChunk::Content(_) => '0',
            OutputChunk::Source(_) => 'h',
            OutputChunk::Data(_) => '2',
            OutputChunk::Finish(_) => 'd',
            OutputChunk::Error(_) => '3',
        }
    }

    pub fn is_content(&self) -> bool {
        matches!(self, OutputChunk::Content(_))
    }

    /// Encode as a single `\n`-terminated protocol line.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        let payload = match self {
            OutputChunk::Content(text) | OutputChunk::Error(text) => serde_json::to_string(text),
            OutputChunk::Source(source) => serde_json::to_string(source),
            OutputChunk::Data(items) => serde_json::to_string(items),
            OutputChunk::Finish(finish) => serde_json::to_string(finish),
        }?;
        Ok(format!("{}:{}\n", self.prefix(), payload))
    }

    pub fn to_bytes(&self) -> Result<Bytes, ProtocolError> {
        self.encode().map(Bytes::from)
    }

    /// Parse one protocol line; a trailing newline is accepted.
    pub fn decode(line: &str) -> Result<Self, ProtocolError> {
        let line = line.trim_end_matches(['\n', '\r']);
        let (prefix, payload) = line.split_once(':').ok_or(ProtocolError::MissingPrefix)?;
        let chunk = match prefix {
            "0" => OutputChunk::Content(serde_json::from_str(payload)?),
            "h" => OutputChunk::Source(serde_json::from_str(payload)?),
            "2" => OutputChunk::Data(serde_json::from_str(payload)?),
            "d" => OutputChunk::Finish(serde_json::from_str(payload)?),
            "3" => OutputChunk::Error(serde_json::from_str(payload)?),
            other => return Err(ProtocolError::UnknownPrefix(other.to_string())),
        };
        Ok(chunk)
    }

    /// Decode every non-empty line of a protocol body.
    pub fn decode_all(body: &str) -> Result<Vec<Self>, ProtocolError> {
        body.lines()
            .filter(|line| !line.trim().is_empty())
            .map(Self::decode)
            .collect()
    }
}
