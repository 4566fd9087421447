//! # Server Handlers
//!
//! HTTP route handlers for the server.

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{
        header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE},
        HeaderName, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Json as JsonResponse, Response},
};
use futures_util::{Stream, StreamExt};
use serde_json::Value;
use std::convert::Infallible;
use tracing::{info, warn};
use uuid::Uuid;

use super::AppState;
use crate::{
    error::BridgeError,
    schemas::{StreamFormat, UpstreamChatRequest},
    streaming::{translate_stream, DATA_STREAM_HEADER, DATA_STREAM_VERSION},
    validation::validate_request,
};

/// Chat handler: validate, open the upstream stream, then stream chunks back.
///
/// Errors before the upstream starts streaming become JSON error responses;
/// anything later is reported in-band as a terminal error chunk.
pub async fn chat(State(state): State<AppState>, body: Bytes) -> Result<Response, BridgeError> {
    let body: Value = serde_json::from_slice(&body).map_err(|e| {
        BridgeError::invalid_request(format!("request body is not valid JSON: {}", e))
    })?;
    let request = validate_request(&body)?;

    let request_id = format!("chat-{}", &Uuid::new_v4().simple().to_string()[..8]);
    let settings = &request.api_settings;
    info!(
        request_id = %request_id,
        messages = request.messages.len(),
        verbosity = %settings.verbosity,
        format = %settings.stream_format,
        caller_key = settings.api_key.is_some(),
        "Chat request accepted"
    );

    let upstream_request = UpstreamChatRequest::streaming(state.upstream().model(), &request);
    let upstream = state
        .upstream()
        .open_stream(&upstream_request, settings.api_key.as_deref())
        .await
        .map_err(|err| {
            warn!(request_id = %request_id, "Upstream call failed: {}", err.wire_message());
            err
        })?;

    let format = settings.stream_format;
    let output = translate_stream(upstream, format.strategy(), &request_id);
    Ok(event_stream_response(output, format))
}

/// Wrap an output stream in an event-stream response.
pub fn event_stream_response<S>(output: S, format: StreamFormat) -> Response
where
    S: Stream<Item = Bytes> + Send + 'static,
{
    let mut response = Response::new(Body::from_stream(output.map(Ok::<_, Infallible>)));
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache, no-transform"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(
        HeaderName::from_static("x-accel-buffering"),
        HeaderValue::from_static("no"),
    );
    if format.advertises_data_stream() {
        headers.insert(
            HeaderName::from_static(DATA_STREAM_HEADER),
            HeaderValue::from_static(DATA_STREAM_VERSION),
        );
    }
    response
}

/// Health check handler
pub async fn health_check() -> impl IntoResponse {
    let health_status = serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": "messari-chat-bridge",
        "version": env!("CARGO_PKG_VERSION")
    });

    (StatusCode::OK, JsonResponse(health_status))
}
