//! Shared infrastructure.

pub mod http_client;

pub use http_client::{HttpClientBuilder, HttpClientConfig, HttpClientError};
