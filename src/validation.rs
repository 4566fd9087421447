//! # Request Validation
//!
//! Turns an inbound JSON body into a [`ChatRequest`]. Messages are strict (a
//! missing or empty list is an error) while API settings are forgiving:
//! unknown enum values fall back to their defaults with a warning.

use crate::{
    error::BridgeError,
    schemas::{ApiSettings, ChatMessage, ChatRequest},
};
use serde_json::Value;
use std::str::FromStr;
use tracing::warn;

/// Wrapper field some clients nest the payload under.
const BODY_WRAPPER: &str = "body";

/// Validate and normalize an inbound request body.
pub fn validate_request(body: &Value) -> Result<ChatRequest, BridgeError> {
    let messages = lookup(body, "messages")
        .ok_or_else(|| BridgeError::invalid_request("messages is required"))?;
    let messages = messages
        .as_array()
        .ok_or_else(|| BridgeError::invalid_request("messages must be an array"))?;
    if messages.is_empty() {
        return Err(BridgeError::invalid_request("messages must not be empty"));
    }

    let messages = messages.iter().map(normalize_message).collect();
    let api_settings = lookup(body, "apiSettings")
        .map(validate_api_settings)
        .unwrap_or_default();

    Ok(ChatRequest {
        messages,
        api_settings,
    })
}

/// Top-level field first, then the same field under the `body` wrapper.
fn lookup<'a>(body: &'a Value, field: &str) -> Option<&'a Value> {
    body.get(field)
        .filter(|value| !value.is_null())
        .or_else(|| {
            body.get(BODY_WRAPPER)
                .and_then(|inner| inner.get(field))
                .filter(|value| !value.is_null())
        })
}

/// Collapse a message to `{role, content: string}`.
///
/// Multi-part content is joined with single spaces; parts without text
/// (images, tool payloads) contribute nothing.
pub fn normalize_message(message: &Value) -> ChatMessage {
    let role = message
        .get("role")
        .and_then(Value::as_str)
        .unwrap_or("user")
        .to_string();

    let content = match message.get("content") {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|part| match part {
                Value::String(text) => Some(text.as_str()),
                other => other.get("text").and_then(Value::as_str),
            })
            .collect::<Vec<_>>()
            .join(" "),
        _ => String::new(),
    };

    ChatMessage { role, content }
}

/// Validate each settings field against its enumeration, coercing bad values.
pub fn validate_api_settings(raw: &Value) -> ApiSettings {
    let api_key = raw
        .get("apiKey")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string);

    ApiSettings {
        api_key,
        verbosity: coerce(raw, "verbosity"),
        stream_format: coerce(raw, "streamFormat"),
    }
}

fn coerce<T>(raw: &Value, field: &str) -> T
where
    T: FromStr<Err = String> + Default + std::fmt::Display,
{
    match raw.get(field) {
        None | Some(Value::Null) => T::default(),
        Some(Value::String(value)) => value.parse().unwrap_or_else(|err: String| {
            let fallback = T::default();
            warn!("Invalid {} in apiSettings ({}), using '{}'", field, err, fallback);
            fallback
        }),
        Some(other) => {
            let fallback = T::default();
            warn!("Invalid {} in apiSettings ({}), using '{}'", field, other, fallback);
            fallback
        }
    }
}
