//! # Upstream Adapters
//!
//! The seam between the HTTP handlers and the chat-completion service. The
//! server only sees [`UpstreamAdapter`]; the production implementation is
//! [`MessariAdapter`], and tests may substitute their own.

use crate::{error::BridgeError, schemas::UpstreamChatRequest, streaming::ByteStream};
use std::time::Duration;

pub mod messari;

pub use messari::MessariAdapter;

/// Default upstream request timeout, covering the whole streamed response.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(280);

/// Process-wide upstream settings, injected rather than read from the
/// environment so adapters stay testable.
#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    /// Base URL; requests go to `<base>/chat/completions`
    pub base_url: String,
    /// Key used when the caller does not supply one
    pub default_api_key: Option<String>,
    /// Model identifier sent upstream
    pub model: String,
    pub timeout: Duration,
}

impl UpstreamSettings {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            default_api_key: None,
            model: model.into(),
            timeout: DEFAULT_UPSTREAM_TIMEOUT,
        }
    }

    pub fn with_default_api_key(mut self, key: impl Into<String>) -> Self {
        self.default_api_key = Some(key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The caller's key when present, the default key otherwise.
    pub fn resolve_api_key<'a>(&'a self, caller_key: Option<&'a str>) -> Option<&'a str> {
        caller_key
            .filter(|key| !key.is_empty())
            .or(self.default_api_key.as_deref())
    }
}

/// A streaming chat-completion backend.
#[async_trait::async_trait]
pub trait UpstreamAdapter: Send + Sync {
    /// Adapter name for logging
    fn name(&self) -> &'static str;

    /// Model identifier to put in upstream requests
    fn model(&self) -> &str;

    /// Issue one streaming request.
    ///
    /// Resolves once response headers arrive: non-success statuses fail here
    /// so the caller can still choose the HTTP status of its own response.
    async fn open_stream(
        &self,
        request: &UpstreamChatRequest,
        api_key: Option<&str>,
    ) -> Result<ByteStream, BridgeError>;
}
