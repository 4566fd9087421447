//! # Application State
//!
//! Shared state handed to every HTTP handler: configuration plus the
//! upstream adapter.

use crate::{
    adapters::{MessariAdapter, UpstreamAdapter},
    config::Config,
    core::http_client::{HttpClientBuilder, HttpClientError},
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Config,
    /// Chat-completion backend
    pub upstream: Arc<dyn UpstreamAdapter>,
}

impl AppState {
    /// Wire the Messari adapter from configuration.
    pub fn new(config: Config) -> Result<Self, HttpClientError> {
        let client = HttpClientBuilder::from_config(&config).build()?;
        let adapter = MessariAdapter::new(config.upstream_settings(), client);
        Ok(Self::with_upstream(config, Arc::new(adapter)))
    }

    /// Use an explicit upstream adapter.
    pub fn with_upstream(config: Config, upstream: Arc<dyn UpstreamAdapter>) -> Self {
        Self { config, upstream }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn upstream(&self) -> &dyn UpstreamAdapter {
        self.upstream.as_ref()
    }
}
