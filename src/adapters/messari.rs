//! # Messari Adapter
//!
//! Streams chat completions from the Messari AI endpoint.
//!
//! ## Key Features:
//! - Single request per call, no retries
//! - Bearer and `x-messari-api-key` authentication
//! - Status errors classified before any bytes reach the client
//! - Response body exposed as a fragment stream

use crate::{
    adapters::{UpstreamAdapter, UpstreamSettings},
    error::BridgeError,
    schemas::UpstreamChatRequest,
    streaming::ByteStream,
};
use futures_util::StreamExt;
use reqwest::{header, Client, StatusCode};
use tracing::{debug, warn};

/// Header the Messari data APIs authenticate with.
pub const MESSARI_KEY_HEADER: &str = "x-messari-api-key";

/// Reported when an error response body cannot be read.
const UNREADABLE_BODY: &str = "<response body unavailable>";

#[derive(Clone, Debug)]
pub struct MessariAdapter {
    settings: UpstreamSettings,
    client: Client,
}

impl MessariAdapter {
    pub fn new(settings: UpstreamSettings, client: Client) -> Self {
        Self { settings, client }
    }

    pub fn settings(&self) -> &UpstreamSettings {
        &self.settings
    }

    /// `<base>/chat/completions`
    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.settings.base_url.trim_end_matches('/'))
    }
}

#[async_trait::async_trait]
impl UpstreamAdapter for MessariAdapter {
    fn name(&self) -> &'static str {
        "messari"
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    async fn open_stream(
        &self,
        request: &UpstreamChatRequest,
        api_key: Option<&str>,
    ) -> Result<ByteStream, BridgeError> {
        let url = self.endpoint();
        debug!(
            "POST {} (messages: {}, verbosity: {}, format: {})",
            url,
            request.messages.len(),
            request.verbosity,
            request.stream_format
        );

        let mut builder = self
            .client
            .post(&url)
            .timeout(self.settings.timeout)
            .header(header::ACCEPT, "text/event-stream")
            .json(request);

        match self.settings.resolve_api_key(api_key) {
            Some(key) => {
                builder = builder.bearer_auth(key).header(MESSARI_KEY_HEADER, key);
            }
            None => warn!("No API key available for upstream request"),
        }

        let response = builder.send().await.map_err(|e| {
            warn!("Upstream request failed: {}", e);
            BridgeError::from(e)
        })?;

        let status = response.status();
        debug!("Upstream response status: {}", status);

        if !status.is_success() {
            let status_text = status.canonical_reason().unwrap_or("Unknown").to_string();
            let body = response.text().await.unwrap_or_else(|e| {
                debug!("Failed to read upstream error body: {}", e);
                UNREADABLE_BODY.to_string()
            });
            warn!("Upstream rejected request: HTTP {} {}", status.as_u16(), body);
            return Err(BridgeError::rejected(status.as_u16(), status_text, body));
        }

        if status == StatusCode::NO_CONTENT || response.content_length() == Some(0) {
            return Err(BridgeError::UpstreamServer(
                "upstream returned no response body".to_string(),
            ));
        }

        Ok(Box::pin(
            response.bytes_stream().map(|fragment| fragment.map_err(BridgeError::from)),
        ))
    }
}
