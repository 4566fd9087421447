#[cfg(feature = "cli")]
use clap::Parser;
use std::time::Duration;
use tracing::warn;
use url::Url;

use crate::adapters::UpstreamSettings;

/// # Bridge Configuration
///
/// Process-wide settings read once at startup from command-line arguments,
/// environment variables and an optional `.env` file.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "cli", derive(Parser))]
#[cfg_attr(feature = "cli", command(name = "chat-bridge"))]
#[cfg_attr(feature = "cli", command(about = "Streams Messari chat completions to data-stream clients"))]
#[cfg_attr(feature = "cli", command(version))]
pub struct Config {
    // =============================================================================
    // SERVER
    // =============================================================================

    /// Server port to listen on
    #[cfg_attr(feature = "cli", arg(short, long, env = "PORT", default_value = "8080"))]
    pub port: u16,

    /// Server host to bind to
    #[cfg_attr(feature = "cli", arg(long, env = "HOST", default_value = "0.0.0.0"))]
    pub host: String,

    // =============================================================================
    // UPSTREAM
    // =============================================================================

    /// Base URL of the chat-completion API
    #[cfg_attr(feature = "cli", arg(long, env = "MESSARI_BASE_URL", default_value = "https://api.messari.io/ai/v1"))]
    pub upstream_base_url: String,

    /// API key used when a request does not carry its own
    #[cfg_attr(feature = "cli", arg(long, env = "MESSARI_API_KEY"))]
    pub default_api_key: Option<String>,

    /// Model identifier sent upstream
    #[cfg_attr(feature = "cli", arg(long, env = "MESSARI_MODEL", default_value = "default"))]
    pub model: String,

    /// Upstream request timeout in seconds, covering the streamed body
    #[cfg_attr(feature = "cli", arg(long, env = "UPSTREAM_TIMEOUT", default_value = "280"))]
    pub upstream_timeout: u64,

    /// Upstream connect timeout in seconds
    #[cfg_attr(feature = "cli", arg(long, env = "CONNECT_TIMEOUT", default_value = "10"))]
    pub connect_timeout: u64,

    // =============================================================================
    // LOGGING AND SECURITY
    // =============================================================================

    /// Log filter: a level or `EnvFilter` directives (e.g. info,tower_http=debug)
    #[cfg_attr(feature = "cli", arg(long, env = "RUST_LOG", default_value = "info"))]
    pub log_level: String,

    /// Environment (development, staging, production)
    #[cfg_attr(feature = "cli", arg(long, env = "ENVIRONMENT", default_value = "development"))]
    pub environment: String,

    /// CORS origin (use * for development only)
    #[cfg_attr(feature = "cli", arg(long, env = "CORS_ORIGIN", default_value = "*"))]
    pub cors_origin: String,
}

impl Config {
    /// Parse configuration from command line arguments and environment variables.
    ///
    /// Loads `.env` if present, parses arguments, initialises logging and
    /// exits the process with a message when validation fails.
    #[cfg(feature = "cli")]
    pub fn parse_args() -> Self {
        let _ = dotenv::dotenv();

        let config = Self::parse();
        config.setup_logging();

        if let Err(err) = config.validate() {
            eprintln!("Configuration validation failed: {}", err);
            std::process::exit(1);
        }

        config
    }

    /// Create a test configuration with minimal required fields.
    pub fn for_test() -> Self {
        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
            upstream_base_url: "http://localhost:9000/ai/v1".to_string(),
            default_api_key: Some("test-default-key".to_string()),
            model: "default".to_string(),
            upstream_timeout: 280,
            connect_timeout: 10,
            log_level: "info".to_string(),
            environment: "development".to_string(),
            cors_origin: "*".to_string(),
        }
    }

    /// Settings injected into the upstream adapter.
    pub fn upstream_settings(&self) -> UpstreamSettings {
        let settings = UpstreamSettings::new(&self.upstream_base_url, &self.model)
            .with_timeout(Duration::from_secs(self.upstream_timeout));
        match self.default_api_key.as_deref().filter(|key| !key.is_empty()) {
            Some(key) => settings.with_default_api_key(key),
            None => settings,
        }
    }

    /// Initialise the tracing subscriber from `log_level`.
    #[cfg(feature = "cli")]
    fn setup_logging(&self) {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(&self.log_level)
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .try_init();
    }

    /// Validate configuration values.
    ///
    /// Hard errors are returned; questionable but workable settings are
    /// logged as warnings.
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("Port cannot be 0. Please specify a valid port number (1-65535).".to_string());
        }

        if self.host.is_empty() {
            return Err("Host cannot be empty. Please specify a valid host (e.g., '0.0.0.0' or 'localhost').".to_string());
        }

        if self.upstream_base_url.is_empty() {
            return Err("Upstream base URL cannot be empty.".to_string());
        }

        match Url::parse(&self.upstream_base_url) {
            Ok(url) => {
                if !["http", "https"].contains(&url.scheme()) {
                    return Err(format!(
                        "Invalid URL scheme '{}'. Only 'http' and 'https' are supported.",
                        url.scheme()
                    ));
                }
                if url.host().is_none() {
                    return Err("Upstream base URL must include a host.".to_string());
                }
                if self.environment == "production" && url.scheme() == "http" {
                    warn!("Using plain HTTP for the upstream in production is not recommended");
                }
            }
            Err(err) => {
                return Err(format!(
                    "Invalid upstream base URL '{}': {}. \
                    Please provide a valid URL (e.g., 'https://api.messari.io/ai/v1').",
                    self.upstream_base_url, err
                ));
            }
        }

        if self.model.trim().is_empty() {
            return Err("Model cannot be empty.".to_string());
        }

        if self.upstream_timeout == 0 {
            return Err("Upstream timeout must be greater than 0 seconds.".to_string());
        }
        if self.connect_timeout == 0 {
            return Err("Connect timeout must be greater than 0 seconds.".to_string());
        }

        #[cfg(feature = "cli")]
        if let Err(err) = tracing_subscriber::EnvFilter::try_new(&self.log_level) {
            return Err(format!(
                "Invalid log filter '{}': {}. Use a level (e.g., 'info') or directives \
                (e.g., 'info,tower_http=debug').",
                self.log_level, err
            ));
        }

        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&self.environment.as_str()) {
            return Err(format!(
                "Invalid environment '{}'. Valid options are: {}",
                self.environment,
                valid_environments.join(", ")
            ));
        }

        if self.default_api_key.is_none() {
            warn!("No MESSARI_API_KEY configured; requests without an apiKey will be sent unauthenticated");
        }

        if self.environment == "production" && self.cors_origin == "*" {
            warn!("Using CORS origin '*' in production is not recommended");
        }

        Ok(())
    }
}
