//! # Streaming Module
//!
//! Translates an upstream chat-completion byte stream into the client data
//! stream protocol.
//!
//! ## Key Features:
//! - Incremental SSE reassembly that tolerates arbitrary fragment boundaries
//! - Pass-through and translation strategies selected once per request
//! - Detached pump with bounded channel backpressure
//! - Terminal error chunks for mid-stream failures and empty responses

pub mod adapters;
pub mod converter;
pub mod core;
pub mod sse;

pub use self::adapters::{PassThroughStrategy, StreamStrategy, TranslateStrategy};
pub use self::converter::convert_event;
pub use self::core::{
    FinishMetadata, OutputChunk, ProtocolError, SourceDescriptor, StructuredData, TokenUsage,
    DATA_STREAM_HEADER, DATA_STREAM_VERSION,
};
pub use self::sse::{EventBuffer, Utf8StreamDecoder};

use crate::error::BridgeError;
use bytes::Bytes;
use futures_util::stream::{Stream, StreamExt};
use std::pin::Pin;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Upstream body fragments with transport errors already classified.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, BridgeError>> + Send>>;

/// Output chunks buffered between the pump and the client.
const CHANNEL_CAPACITY: usize = 64;

/// Start translating `upstream` and return the readable end immediately.
///
/// The pump runs on its own task. Each upstream fragment is fully processed
/// and written before the next one is read; the pump stops as soon as the
/// returned stream is dropped.
pub fn translate_stream<S>(
    upstream: S,
    strategy: Box<dyn StreamStrategy>,
    request_id: &str,
) -> ReceiverStream<Bytes>
where
    S: Stream<Item = Result<Bytes, BridgeError>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<Bytes>(CHANNEL_CAPACITY);
    let span = info_span!("stream", request_id = %request_id, strategy = strategy.name());
    tokio::spawn(pump(upstream, strategy, tx).instrument(span));
    ReceiverStream::new(rx)
}

/// Client went away; nothing more can be written.
struct Disconnected;

async fn send_all(tx: &mpsc::Sender<Bytes>, out: Vec<Bytes>) -> Result<(), Disconnected> {
    for bytes in out {
        tx.send(bytes).await.map_err(|_| Disconnected)?;
    }
    Ok(())
}

async fn pump<S>(upstream: S, mut strategy: Box<dyn StreamStrategy>, tx: mpsc::Sender<Bytes>)
where
    S: Stream<Item = Result<Bytes, BridgeError>> + Send + 'static,
{
    let started = Instant::now();
    let mut upstream = Box::pin(upstream);
    let mut failure = None;

    while let Some(item) = upstream.next().await {
        match item {
            Ok(fragment) => {
                if send_all(&tx, strategy.on_fragment(fragment)).await.is_err() {
                    debug!("Client disconnected, stopping stream");
                    return;
                }
            }
            Err(err) => {
                failure = Some(err);
                break;
            }
        }
    }

    let terminal = match failure {
        Some(err) => {
            error!("Upstream stream failed: {}", err.wire_message());
            adapters::error_bytes(&err)
        }
        None => {
            if send_all(&tx, strategy.on_complete()).await.is_err() {
                debug!("Client disconnected during final flush");
                return;
            }
            if strategy.content_observed() {
                None
            } else {
                warn!("Stream completed without any content");
                adapters::error_bytes(&BridgeError::NoContent)
            }
        }
    };

    if let Some(bytes) = terminal {
        let _ = tx.send(bytes).await;
    }

    info!(
        events = strategy.events_processed(),
        content = strategy.content_observed(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Stream closed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::schemas::StreamFormat;
    use futures_util::stream;

    async fn collect(
        fragments: Vec<Result<Bytes, BridgeError>>,
        format: StreamFormat,
    ) -> Vec<OutputChunk> {
        let out: Vec<Bytes> = translate_stream(stream::iter(fragments), format.strategy(), "test")
            .collect()
            .await;
        let body: String = out
            .iter()
            .map(|bytes| String::from_utf8(bytes.to_vec()).unwrap())
            .collect();
        OutputChunk::decode_all(&body).unwrap()
    }

    #[tokio::test]
    async fn test_translate_stream_emits_content() {
        let chunks = collect(
            vec![Ok(Bytes::from_static(
                b"data: {\"id\":\"t\",\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n",
            ))],
            StreamFormat::OpenAi,
        )
        .await;
        assert_eq!(chunks, vec![OutputChunk::Content("Hi".to_string())]);
    }

    #[tokio::test]
    async fn test_no_content_emits_single_error() {
        let chunks = collect(
            vec![
                Ok(Bytes::from_static(b"data: {\"choices\":[]}\n\n")),
                Ok(Bytes::from_static(
                    b"data: {\"id\":\"t\",\"choices\":[{\"finish_reason\":\"stop\"}],\"metadata\":{}}\n\n",
                )),
                Ok(Bytes::from_static(b"data: [DONE]\n\n")),
            ],
            StreamFormat::OpenAi,
        )
        .await;
        assert_eq!(chunks.len(), 2);
        assert!(matches!(chunks[0], OutputChunk::Finish(_)));
        match &chunks[1] {
            OutputChunk::Error(message) => assert!(message.starts_with("ERR_NO_CONTENT:")),
            other => panic!("unexpected chunk {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_mid_stream_failure_is_terminal() {
        let chunks = collect(
            vec![
                Ok(Bytes::from_static(
                    b"data: {\"choices\":[{\"delta\":{\"content\":\"partial\"}}]}\n\n",
                )),
                Err(BridgeError::unavailable("connection reset by peer")),
                Ok(Bytes::from_static(
                    b"data: {\"choices\":[{\"delta\":{\"content\":\"never\"}}]}\n\n",
                )),
            ],
            StreamFormat::OpenAi,
        )
        .await;
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], OutputChunk::Content("partial".to_string()));
        let expected = BridgeError::unavailable("connection reset by peer");
        assert_eq!(expected.code(), ErrorCode::Network);
        assert_eq!(chunks[1], OutputChunk::error(&expected));
    }

    #[tokio::test]
    async fn test_pass_through_appends_no_content_error() {
        let chunks = collect(
            vec![Ok(Bytes::from_static(b"d:{\"finishReason\":\"stop\",\"traceId\":null,\"usage\":{\"promptTokens\":0,\"completionTokens\":0}}\n"))],
            StreamFormat::Vercel,
        )
        .await;
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1], OutputChunk::error(&BridgeError::NoContent));
    }

    #[tokio::test]
    async fn test_pump_stops_when_client_disconnects() {
        let (tx, rx) = mpsc::channel::<Result<Bytes, BridgeError>>(4);
        let output = translate_stream(ReceiverStream::new(rx), StreamFormat::Vercel.strategy(), "test");
        drop(output);
        // The pump notices the closed channel on its first write.
        tx.send(Ok(Bytes::from_static(b"0:\"x\"\n"))).await.unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(1), tx.closed())
            .await
            .expect("pump should exit after the client goes away");
    }
}
