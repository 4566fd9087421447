//! # Messari Chat Bridge
//!
//! Streaming protocol bridge between Messari's chat-completion API and
//! clients speaking the data stream protocol (`0:` content, `h:` sources,
//! `2:` structured data, `d:` finish, `3:` error lines).
//!
//! ## Features
//!
//! - **Request validation**: messages and `apiSettings` are normalised before anything goes upstream
//! - **Two stream formats**: `vercel` passes upstream bytes through untouched, `openai` translates SSE events
//! - **Fragment-safe parsing**: UTF-8 and SSE events are reassembled across arbitrary chunk boundaries
//! - **Structured errors**: every failure carries a stable `ERR_*` code, in JSON or in-band
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use messari_chat_bridge::{create_router, AppState, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::for_test(); // or Config::parse_args() for CLI
//!     let state = AppState::new(config)?;
//!     let app = create_router(state);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`validation`] - inbound request checks and normalisation
//! - [`adapters`] - upstream invocation behind the [`UpstreamAdapter`] trait
//! - [`streaming`] - SSE reassembly, event conversion and the output codec
//! - [`server`] - axum router, handlers and application state
//! - [`error`] - error taxonomy and wire codes

// Core infrastructure
pub mod core;
pub mod config;
pub mod error;
pub mod schemas;

// Domain modules
pub mod adapters;
pub mod streaming;
pub mod validation;

#[cfg(feature = "server")]
pub mod server;

#[cfg(feature = "server")]
pub mod graceful_shutdown;

// Re-export commonly used types for convenience
pub use adapters::{MessariAdapter, UpstreamAdapter, UpstreamSettings};
pub use config::Config;
pub use error::{BridgeError, ErrorCode};
pub use schemas::{ApiSettings, ChatMessage, ChatRequest, StreamFormat, UpstreamChatRequest, Verbosity};
pub use streaming::{translate_stream, ByteStream, OutputChunk};
pub use validation::validate_request;
pub use self::core::http_client::{HttpClientBuilder, HttpClientConfig};

// Server re-exports (feature-gated)
#[cfg(feature = "server")]
pub use server::{create_router, AppState};

/// The result type used throughout the library
pub type Result<T> = std::result::Result<T, BridgeError>;
