//! # Graceful Shutdown
//!
//! Signal handling for the bridge server. Once a signal arrives the listener
//! stops accepting connections while in-flight chat streams run to completion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

/// Tracks whether a shutdown signal has been received.
#[derive(Clone, Default)]
pub struct GracefulShutdown {
    initiated: Arc<AtomicBool>,
}

impl GracefulShutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_shutdown_initiated(&self) -> bool {
        self.initiated.load(Ordering::Relaxed)
    }

    pub fn initiate_shutdown(&self) {
        if !self.initiated.swap(true, Ordering::Relaxed) {
            info!("Graceful shutdown initiated, draining open streams");
        }
    }

    /// Wait for SIGINT or, on unix, SIGTERM.
    pub async fn wait_for_signal(&self) {
        let ctrl_c = async {
            if let Err(err) = signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", err);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(err) => {
                    error!("Failed to install SIGTERM handler: {}", err);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received SIGINT"),
            _ = terminate => info!("Received SIGTERM"),
        }

        self.initiate_shutdown();
    }
}

/// Future suitable for `axum::serve(..).with_graceful_shutdown`.
pub async fn shutdown_signal() {
    GracefulShutdown::new().wait_for_signal().await;
}
