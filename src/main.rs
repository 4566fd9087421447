//! # Messari Chat Bridge - Server Binary
//!
//! Parses configuration, wires the upstream adapter and serves the chat
//! endpoints until a shutdown signal arrives.

use messari_chat_bridge::{create_router, graceful_shutdown::shutdown_signal, AppState, Config};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from CLI args and .env file
    let config = Config::parse_args();

    let state = AppState::new(config.clone())?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!("Chat bridge starting on http://{}", listener.local_addr()?);
    info!("Model: {}", config.model);

    // Log upstream URL safely (scheme and host only)
    let safe_url = match url::Url::parse(&config.upstream_base_url) {
        Ok(url) => format!("{}://{}", url.scheme(), url.host_str().unwrap_or("unknown")),
        Err(_) => "invalid-url".to_string(),
    };
    info!("Upstream: {}", safe_url);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Chat bridge stopped");
    Ok(())
}
