//! # Server Module
//!
//! Router, handlers and shared state for the HTTP surface.

pub mod handlers;
pub mod state;

pub use handlers::{chat, health_check};
pub use state::AppState;

use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{self, TraceLayer},
};
use tracing::{warn, Level};

/// Create router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config().cors_origin);

    Router::new()
        // Chat endpoint consumed by the data-stream client
        .route("/api/chat", post(chat))
        .route("/v1/chat", post(chat))

        // Health check endpoint for production monitoring
        .route("/health", get(health_check))

        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http()
                    .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                    .on_response(trace::DefaultOnResponse::new().level(Level::INFO)))
                .layer(cors),
        )
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    if origin == "*" {
        return CorsLayer::permissive();
    }
    match HeaderValue::from_str(origin) {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any),
        Err(err) => {
            warn!("Ignoring invalid CORS origin '{}': {}", origin, err);
            CorsLayer::new()
        }
    }
}
