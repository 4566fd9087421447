//! # Error Taxonomy
//!
//! Every failure the bridge can report is a [`BridgeError`]. Each variant maps
//! to a fixed [`ErrorCode`] token, and the code is what reaches clients, either
//! in a JSON error body (before streaming starts) or in a terminal `3:` chunk
//! (once the stream is open and headers are committed).

#[cfg(feature = "server")]
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// Closed set of error codes carried on the wire as `<CODE>: <message>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidRequest,
    Network,
    Timeout,
    UpstreamUnavailable,
    Unauthorized,
    ServerError,
    NoContent,
    ConversionSkipped,
}

impl ErrorCode {
    /// All codes, in declaration order.
    pub const ALL: [ErrorCode; 8] = [
        ErrorCode::InvalidRequest,
        ErrorCode::Network,
        ErrorCode::Timeout,
        ErrorCode::UpstreamUnavailable,
        ErrorCode::Unauthorized,
        ErrorCode::ServerError,
        ErrorCode::NoContent,
        ErrorCode::ConversionSkipped,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "ERR_INVALID_REQUEST",
            ErrorCode::Network => "ERR_NETWORK",
            ErrorCode::Timeout => "ERR_TIMEOUT",
            ErrorCode::UpstreamUnavailable => "ERR_UPSTREAM_UNAVAILABLE",
            ErrorCode::Unauthorized => "ERR_UNAUTHORIZED",
            ErrorCode::ServerError => "ERR_SERVER_ERROR",
            ErrorCode::NoContent => "ERR_NO_CONTENT",
            ErrorCode::ConversionSkipped => "ERR_CONVERSION_SKIPPED",
        }
    }

    /// Parse a wire token back into a code.
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|code| code.as_str() == token)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport-level failure flavour for [`BridgeError::UpstreamUnavailable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableKind {
    Network,
    Timeout,
    Unknown,
}

impl UnavailableKind {
    /// Classify a transport failure from its diagnostic text.
    pub fn from_message(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        if lower.contains("timeout") || lower.contains("timed out") || lower.contains("abort") {
            UnavailableKind::Timeout
        } else if lower.contains("network")
            || lower.contains("connect")
            || lower.contains("fetch")
            || lower.contains("dns")
            || lower.contains("reset")
        {
            UnavailableKind::Network
        } else {
            UnavailableKind::Unknown
        }
    }
}

/// Flavour of a non-success upstream HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectedKind {
    Unauthorized,
    ServerError,
}

impl RejectedKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => RejectedKind::Unauthorized,
            _ => RejectedKind::ServerError,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum BridgeError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("{message}")]
    UpstreamUnavailable {
        kind: UnavailableKind,
        message: String,
    },

    #[error("upstream responded {status} {status_text}: {body}")]
    UpstreamRejected {
        kind: RejectedKind,
        status: u16,
        status_text: String,
        body: String,
    },

    /// Upstream answered successfully but without a usable body.
    #[error("{0}")]
    UpstreamServer(String),

    #[error("no content received from upstream")]
    NoContent,

    /// A single SSE event could not be converted. Never surfaced to clients.
    #[error("skipped event: {0}")]
    ConversionSkipped(String),
}

impl BridgeError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        BridgeError::InvalidRequest(message.into())
    }

    /// Transport failure whose flavour is inferred from the diagnostic text.
    pub fn unavailable(message: impl Into<String>) -> Self {
        let message = message.into();
        BridgeError::UpstreamUnavailable {
            kind: UnavailableKind::from_message(&message),
            message,
        }
    }

    pub fn rejected(status: u16, status_text: impl Into<String>, body: impl Into<String>) -> Self {
        BridgeError::UpstreamRejected {
            kind: RejectedKind::from_status(status),
            status,
            status_text: status_text.into(),
            body: body.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            BridgeError::InvalidRequest(_) => ErrorCode::InvalidRequest,
            BridgeError::UpstreamUnavailable { kind, .. } => match kind {
                UnavailableKind::Network => ErrorCode::Network,
                UnavailableKind::Timeout => ErrorCode::Timeout,
                UnavailableKind::Unknown => ErrorCode::UpstreamUnavailable,
            },
            BridgeError::UpstreamRejected { kind, .. } => match kind {
                RejectedKind::Unauthorized => ErrorCode::Unauthorized,
                RejectedKind::ServerError => ErrorCode::ServerError,
            },
            BridgeError::UpstreamServer(_) => ErrorCode::ServerError,
            BridgeError::NoContent => ErrorCode::NoContent,
            BridgeError::ConversionSkipped(_) => ErrorCode::ConversionSkipped,
        }
    }

    /// HTTP status used when the error is reported before streaming starts.
    pub fn status_code(&self) -> u16 {
        match self.code() {
            ErrorCode::Unauthorized => 401,
            _ => 500,
        }
    }

    /// `<CODE>: <message>` as carried in error bodies and `3:` chunks.
    pub fn wire_message(&self) -> String {
        format!("{}: {}", self.code(), self)
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({ "error": self.wire_message() })
    }
}

#[cfg(feature = "server")]
impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

/// Transport failures from the HTTP client.
///
/// Status errors never reach this conversion: non-success responses are
/// turned into [`BridgeError::UpstreamRejected`] by the adapter, which still
/// has the response body to report.
impl From<reqwest::Error> for BridgeError {
    fn from(err: reqwest::Error) -> Self {
        let message = err.to_string();
        let kind = if err.is_timeout() {
            UnavailableKind::Timeout
        } else if err.is_connect() || err.is_request() || err.is_body() || err.is_decode() {
            UnavailableKind::Network
        } else {
            UnavailableKind::from_message(&message)
        };
        BridgeError::UpstreamUnavailable { kind, message }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::ConversionSkipped(format!("JSON error: {}", err))
    }
}
