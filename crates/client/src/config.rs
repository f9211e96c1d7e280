//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required for remote flows
//! - `TT_API_BASE_URL` - Remote action endpoint
//!
//! ## Optional
//! - `TT_STATE_PATH` - Persisted state file (default: `.tealtree/state.json`)
//! - `TT_SITE_URL` - Base URL page locations are resolved against (default: `http://localhost/`)
//! - `TT_API_TIMEOUT_SECS` - Request timeout in seconds (default: 30)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_STATE_PATH: &str = ".tealtree/state.json";
const DEFAULT_SITE_URL: &str = "http://localhost/";
const DEFAULT_TIMEOUT_SECS: &str = "30";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Remote action endpoint, if configured
    pub api_base_url: Option<Url>,
    /// File holding the persisted client state
    pub state_path: PathBuf,
    /// Base URL for resolving page locations
    pub site_url: Url,
    /// Request timeout for the remote endpoint
    pub api_timeout: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if any variable fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// See [`ClientConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_base_url = non_empty(lookup("TT_API_BASE_URL"))
            .map(|value| parse_url("TT_API_BASE_URL", &value))
            .transpose()?;
        let site_url = parse_url(
            "TT_SITE_URL",
            &or_default(lookup("TT_SITE_URL"), DEFAULT_SITE_URL),
        )?;
        let state_path = PathBuf::from(or_default(lookup("TT_STATE_PATH"), DEFAULT_STATE_PATH));

        let timeout_secs = or_default(lookup("TT_API_TIMEOUT_SECS"), DEFAULT_TIMEOUT_SECS)
            .trim()
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("TT_API_TIMEOUT_SECS".to_string(), e.to_string())
            })?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "TT_API_TIMEOUT_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            api_base_url,
            state_path,
            site_url,
            api_timeout: Duration::from_secs(timeout_secs),
            sentry_dsn: non_empty(lookup("SENTRY_DSN")),
            sentry_environment: non_empty(lookup("SENTRY_ENVIRONMENT")),
        })
    }

    /// The remote endpoint.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `TT_API_BASE_URL` is not set.
    pub fn api_url(&self) -> Result<&Url, ConfigError> {
        self.api_base_url
            .as_ref()
            .ok_or_else(|| ConfigError::MissingEnvVar("TT_API_BASE_URL".to_string()))
    }

    /// Resolve a page path such as `admin/dashboard.html` against the site URL.
    ///
    /// # Errors
    ///
    /// Returns `url::ParseError` if `page` cannot be joined.
    pub fn page_url(&self, page: &str) -> Result<Url, url::ParseError> {
        self.site_url.join(page)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn or_default(value: Option<String>, default: &str) -> String {
    non_empty(value).unwrap_or_else(|| default.to_string())
}

fn parse_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value.trim()).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}
