//! # Schemas Module
//!
//! Data structures for the inbound chat request, the upstream Messari
//! chat-completion request, and the upstream streaming chunks.
//!
//! Output protocol chunks live in [`crate::streaming::core`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// A chat message after normalization: content is always plain text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// How much detail the upstream assistant should produce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Succinct,
    #[default]
    Balanced,
    Verbose,
}

impl Verbosity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verbosity::Succinct => "succinct",
            Verbosity::Balanced => "balanced",
            Verbosity::Verbose => "verbose",
        }
    }
}

impl FromStr for Verbosity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "succinct" => Ok(Verbosity::Succinct),
            "balanced" => Ok(Verbosity::Balanced),
            "verbose" => Ok(Verbosity::Verbose),
            other => Err(format!("unknown verbosity '{}'", other)),
        }
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stream format negotiated with the client and forwarded upstream.
///
/// `Vercel` means the upstream already speaks the data-stream protocol and
/// bytes are passed through. `OpenAi` means the upstream emits OpenAI-style
/// SSE deltas that must be translated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum StreamFormat {
    #[default]
    #[serde(rename = "vercel")]
    Vercel,
    #[serde(rename = "openai")]
    OpenAi,
}

impl StreamFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamFormat::Vercel => "vercel",
            StreamFormat::OpenAi => "openai",
        }
    }
}

impl FromStr for StreamFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vercel" => Ok(StreamFormat::Vercel),
            "openai" => Ok(StreamFormat::OpenAi),
            other => Err(format!("unknown stream format '{}'", other)),
        }
    }
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-request API settings after coercion to valid values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiSettings {
    pub api_key: Option<String>,
    pub verbosity: Verbosity,
    pub stream_format: StreamFormat,
}

/// A validated inbound chat request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub api_settings: ApiSettings,
}

/// Body posted to `<base>/chat/completions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub verbosity: Verbosity,
    pub stream: bool,
    pub stream_format: StreamFormat,
    pub inline_citations: bool,
}

impl UpstreamChatRequest {
    /// Build the streaming upstream request for a validated chat request.
    pub fn streaming(model: impl Into<String>, request: &ChatRequest) -> Self {
        Self {
            model: model.into(),
            messages: request.messages.clone(),
            verbosity: request.api_settings.verbosity,
            stream: true,
            stream_format: request.api_settings.stream_format,
            inline_citations: true,
        }
    }
}

// =============================================================================
// UPSTREAM STREAMING CHUNKS
// =============================================================================

/// One JSON payload from an upstream `data:` line.
///
/// Fields stay as raw JSON so an unexpected type in one of them only
/// disables the rule that reads it, never the whole event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamChunk {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub choices: Option<Value>,
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl UpstreamChunk {
    /// First entry of `choices`, if it is a non-empty array.
    pub fn first_choice(&self) -> Option<UpstreamChoice<'_>> {
        self.choices
            .as_ref()
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .map(UpstreamChoice)
    }

    /// Chunk id as a trace id; numeric ids are stringified.
    pub fn trace_id(&self) -> Option<String> {
        match self.id.as_ref()? {
            Value::String(id) => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }

    /// Metadata present and not a falsy literal.
    pub fn has_metadata(&self) -> bool {
        self.metadata.as_ref().is_some_and(is_truthy)
    }

    /// `metadata.cited_sources` when it is a non-empty array.
    pub fn cited_sources(&self) -> Option<&Vec<Value>> {
        self.metadata_array("cited_sources")
    }

    /// `metadata.charts` when it is a non-empty array.
    pub fn charts(&self) -> Option<&Vec<Value>> {
        self.metadata_array("charts")
    }

    /// Message of the upstream error, `Some(None)` when the error has none.
    pub fn error_message(&self) -> Option<Option<&str>> {
        let error = self.error.as_ref().filter(|error| is_truthy(error))?;
        Some(
            error
                .get("message")
                .and_then(Value::as_str)
                .filter(|message| !message.is_empty()),
        )
    }

    fn metadata_array(&self, field: &str) -> Option<&Vec<Value>> {
        self.metadata
            .as_ref()
            .and_then(|metadata| metadata.get(field))
            .and_then(Value::as_array)
            .filter(|items| !items.is_empty())
    }
}

/// Borrowed view of one upstream choice.
#[derive(Debug, Clone, Copy)]
pub struct UpstreamChoice<'a>(pub &'a Value);

impl<'a> UpstreamChoice<'a> {
    /// Non-empty delta text, if any.
    pub fn content(&self) -> Option<&'a str> {
        self.0
            .get("delta")
            .and_then(|delta| delta.get("content"))
            .and_then(Value::as_str)
            .filter(|content| !content.is_empty())
    }

    /// First non-empty of `finish_reason` and `finishReason`.
    pub fn finish_reason(&self) -> Option<&'a str> {
        let field = |name: &str| {
            self.0
                .get(name)
                .and_then(Value::as_str)
                .filter(|reason| !reason.is_empty())
        };
        field("finish_reason").or_else(|| field("finishReason"))
    }
}

/// JSON truthiness: `null`, `false`, `0` and `""` count as absent.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
