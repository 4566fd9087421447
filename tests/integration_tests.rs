//! # Integration Tests
//!
//! Drives the full router against a mock upstream: validation, upstream
//! invocation, stream translation and error responses.

use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use bytes::Bytes;
use futures_util::stream;
use messari_chat_bridge::{
    adapters::UpstreamAdapter,
    config::Config,
    error::BridgeError,
    schemas::UpstreamChatRequest,
    server::{create_router, AppState},
    streaming::{ByteStream, OutputChunk, SourceDescriptor, StructuredData},
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

const COMPLETIONS_PATH: &str = "/ai/v1/chat/completions";

/// Build a router whose upstream points at the mock server.
fn app_for(server: &MockServer) -> Router {
    let mut config = Config::for_test();
    config.upstream_base_url = format!("{}/ai/v1", server.uri());
    create_router(AppState::new(config).unwrap())
}

async fn post_json(app: Router, uri: &str, body: String) -> (StatusCode, HeaderMap, String) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn post_chat(app: Router, body: Value) -> (StatusCode, HeaderMap, String) {
    post_json(app, "/api/chat", body.to_string()).await
}

fn sse(events: &[Value]) -> String {
    let mut body: String = events.iter().map(|event| format!("data: {}\n\n", event)).collect();
    body.push_str("data: [DONE]\n\n");
    body
}

fn error_message(body: &str) -> String {
    let value: Value = serde_json::from_str(body).unwrap();
    value["error"].as_str().unwrap().to_string()
}

async fn mount_stream(server: &MockServer, body: String) {
    Mock::given(method("POST"))
        .and(path(COMPLETIONS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_openai_stream_is_translated() {
    let server = MockServer::start().await;
    mount_stream(
        &server,
        sse(&[
            json!({"id": "trace-1", "choices": [{"delta": {"content": "Bitcoin"}}]}),
            json!({"id": "trace-1", "choices": [{"delta": {"content": " is up."}}]}),
            json!({
                "id": "trace-1",
                "choices": [{"delta": {}, "finish_reason": "stop"}],
                "metadata": {"cited_sources": [
                    {"citationId": 1, "url": "https://messari.io/report", "title": "Report", "domain": "messari.io"}
                ]}
            }),
        ]),
    )
    .await;

    let (status, headers, body) = post_chat(
        app_for(&server),
        json!({
            "messages": [{"role": "user", "content": "How is BTC?"}],
            "apiSettings": {"streamFormat": "openai"}
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["content-type"], "text/event-stream");
    assert!(headers.get("x-vercel-ai-data-stream").is_none());

    let chunks = OutputChunk::decode_all(&body).unwrap();
    assert_eq!(chunks.len(), 5);
    assert_eq!(chunks[0], OutputChunk::Content("Bitcoin".to_string()));
    assert_eq!(chunks[1], OutputChunk::Content(" is up.".to_string()));
    assert_eq!(
        chunks[2],
        OutputChunk::Source(SourceDescriptor::Url {
            id: "1".to_string(),
            url: Some("https://messari.io/report".to_string()),
            title: Some("Report".to_string()),
            domain: Some("messari.io".to_string()),
        })
    );
    match &chunks[3] {
        OutputChunk::Data(data) => match &data[..] {
            [StructuredData::CitationData { trace_id, citations }] => {
                assert_eq!(trace_id.as_deref(), Some("trace-1"));
                assert_eq!(citations.len(), 1);
            }
            other => panic!("unexpected data {other:?}"),
        },
        other => panic!("unexpected chunk {other:?}"),
    }
    match &chunks[4] {
        OutputChunk::Finish(finish) => {
            assert_eq!(finish.finish_reason, "stop");
            assert_eq!(finish.trace_id.as_deref(), Some("trace-1"));
            assert_eq!(finish.usage.prompt_tokens, 0);
            assert_eq!(finish.usage.completion_tokens, 0);
        }
        other => panic!("unexpected chunk {other:?}"),
    }
}

#[tokio::test]
async fn test_vercel_stream_passes_through() {
    let server = MockServer::start().await;
    let upstream_body = "0:\"Hello\"\n0:\" there\"\nd:{\"finishReason\":\"stop\"}\n";
    mount_stream(&server, upstream_body.to_string()).await;

    let (status, headers, body) = post_chat(
        app_for(&server),
        json!({"messages": [{"role": "user", "content": "hi"}]}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["x-vercel-ai-data-stream"], "v1");
    assert_eq!(headers["cache-control"], "no-cache, no-transform");
    assert_eq!(body, upstream_body);
}

#[tokio::test]
async fn test_v1_chat_alias() {
    let server = MockServer::start().await;
    mount_stream(&server, "0:\"ok\"\n".to_string()).await;

    let (status, _, body) = post_json(
        app_for(&server),
        "/v1/chat",
        json!({"messages": [{"role": "user", "content": "hi"}]}).to_string(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "0:\"ok\"\n");
}

#[tokio::test]
async fn test_empty_stream_reports_no_content() {
    let server = MockServer::start().await;
    mount_stream(
        &server,
        sse(&[json!({"id": "t", "choices": [{"delta": {}, "finish_reason": "stop"}], "metadata": {}})]),
    )
    .await;

    let (status, _, body) = post_chat(
        app_for(&server),
        json!({
            "messages": [{"role": "user", "content": "hi"}],
            "apiSettings": {"streamFormat": "openai"}
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let chunks = OutputChunk::decode_all(&body).unwrap();
    let errors: Vec<_> = chunks
        .iter()
        .filter_map(|chunk| match chunk {
            OutputChunk::Error(message) => Some(message.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("ERR_NO_CONTENT:"));
    assert!(matches!(chunks.last(), Some(OutputChunk::Error(_))));
}

#[tokio::test]
async fn test_upstream_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let (status, _, body) = post_chat(
        app_for(&server),
        json!({"messages": [{"role": "user", "content": "hi"}]}),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let message = error_message(&body);
    assert!(message.starts_with("ERR_UNAUTHORIZED:"), "{message}");
    assert!(message.contains("invalid api key"));
}

#[tokio::test]
async fn test_upstream_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let (status, _, body) = post_chat(
        app_for(&server),
        json!({"messages": [{"role": "user", "content": "hi"}]}),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let message = error_message(&body);
    assert!(message.starts_with("ERR_SERVER_ERROR:"), "{message}");
    assert!(message.contains("503"));
}

#[tokio::test]
async fn test_unreachable_upstream_is_network_error() {
    let mut config = Config::for_test();
    // Nothing listens on the discard port.
    config.upstream_base_url = "http://127.0.0.1:9/ai/v1".to_string();
    let app = create_router(AppState::new(config).unwrap());

    let (status, _, body) = post_chat(
        app,
        json!({"messages": [{"role": "user", "content": "hi"}]}),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(error_message(&body).starts_with("ERR_NETWORK:"));
}

#[tokio::test]
async fn test_invalid_requests_are_rejected() {
    let server = MockServer::start().await;

    for body in [
        json!({}),
        json!({"messages": "hello"}),
        json!({"messages": []}),
    ] {
        let (status, _, response) = post_chat(app_for(&server), body).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(error_message(&response).starts_with("ERR_INVALID_REQUEST:"));
    }

    let (status, _, response) =
        post_json(app_for(&server), "/api/chat", "not json".to_string()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(error_message(&response).starts_with("ERR_INVALID_REQUEST:"));

    // Nothing reached the upstream.
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_caller_key_takes_precedence() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS_PATH))
        .and(header("authorization", "Bearer caller-key"))
        .and(header("x-messari-api-key", "caller-key"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("0:\"ok\"\n", "text/event-stream"))
        .mount(&server)
        .await;

    let (status, _, _) = post_chat(
        app_for(&server),
        json!({
            "messages": [{"role": "user", "content": "hi"}],
            "apiSettings": {"apiKey": "caller-key"}
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_default_key_used_without_caller_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS_PATH))
        .and(header("authorization", "Bearer test-default-key"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("0:\"ok\"\n", "text/event-stream"))
        .mount(&server)
        .await;

    let (status, _, _) = post_chat(
        app_for(&server),
        json!({
            "messages": [{"role": "user", "content": "hi"}],
            "apiSettings": {"apiKey": "   "}
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_upstream_request_body() {
    let server = MockServer::start().await;
    mount_stream(&server, "0:\"ok\"\n".to_string()).await;

    let (status, _, _) = post_chat(
        app_for(&server),
        json!({
            "body": {
                "messages": [
                    {"role": "system", "content": "Be brief."},
                    {"content": [{"type": "text", "text": "Price"}, "of ETH?"]}
                ],
                "apiSettings": {"verbosity": "loud", "streamFormat": "openai"}
            }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(
        sent,
        json!({
            "model": "default",
            "messages": [
                {"role": "system", "content": "Be brief."},
                {"role": "user", "content": "Price of ETH?"}
            ],
            "verbosity": "balanced",
            "stream": true,
            "stream_format": "openai",
            "inline_citations": true
        })
    );
}

#[tokio::test]
async fn test_health_check() {
    let server = MockServer::start().await;
    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let response = app_for(&server).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let health: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(health["status"], "healthy");
    assert!(health["timestamp"].is_string());
}

/// Upstream that streams one content event, then times out.
struct StallingUpstream;

#[async_trait::async_trait]
impl UpstreamAdapter for StallingUpstream {
    fn name(&self) -> &'static str {
        "stalling"
    }

    fn model(&self) -> &str {
        "default"
    }

    async fn open_stream(
        &self,
        _request: &UpstreamChatRequest,
        _api_key: Option<&str>,
    ) -> Result<ByteStream, BridgeError> {
        Ok(Box::pin(stream::iter(vec![
            Ok(Bytes::from_static(
                b"data: {\"choices\":[{\"delta\":{\"content\":\"partial\"}}]}\n\n",
            )),
            Err(BridgeError::unavailable("operation timed out")),
        ])))
    }
}

#[tokio::test]
async fn test_mid_stream_failure_ends_with_error_chunk() {
    let state = AppState::with_upstream(Config::for_test(), Arc::new(StallingUpstream));
    let (status, _, body) = post_chat(
        create_router(state),
        json!({
            "messages": [{"role": "user", "content": "hi"}],
            "apiSettings": {"streamFormat": "openai"}
        }),
    )
    .await;

    // Headers were already committed, so the failure is reported in-band.
    assert_eq!(status, StatusCode::OK);
    let chunks = OutputChunk::decode_all(&body).unwrap();
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0], OutputChunk::Content("partial".to_string()));
    match &chunks[1] {
        OutputChunk::Error(message) => assert!(message.starts_with("ERR_TIMEOUT:"), "{message}"),
        other => panic!("unexpected chunk {other:?}"),
    }
}
