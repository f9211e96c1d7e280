//! CLI error type.

use thiserror::Error;

use tealtree_client::services::{AuthError, CheckoutError, OrderError};
use tealtree_client::{ApiError, ClientError, ConfigError};

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// A library flow failed.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// A page path could not be resolved against the site URL.
    #[error("Invalid page {0}: {1}")]
    InvalidPage(String, url::ParseError),

    /// An argument was rejected after parsing.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Output could not be rendered.
    #[error("Render error: {0}")]
    Render(#[from] serde_json::Error),
}

impl CliError {
    /// Report unexpected failures to Sentry.
    pub fn report(&self) {
        if let Self::Client(err) = self {
            err.report();
        }
    }

    /// Message to show on the terminal.
    pub fn user_message(&self) -> String {
        match self {
            Self::Client(ClientError::Config(err)) => err.to_string(),
            Self::Client(err) => err.user_message(),
            other => other.to_string(),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::Client(err.into())
    }
}

impl From<ApiError> for CliError {
    fn from(err: ApiError) -> Self {
        Self::Client(err.into())
    }
}

impl From<AuthError> for CliError {
    fn from(err: AuthError) -> Self {
        Self::Client(err.into())
    }
}

impl From<CheckoutError> for CliError {
    fn from(err: CheckoutError) -> Self {
        Self::Client(err.into())
    }
}

impl From<OrderError> for CliError {
    fn from(err: OrderError) -> Self {
        Self::Client(err.into())
    }
}
