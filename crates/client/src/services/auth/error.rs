//! Authentication error types.

use std::time::Duration;

use thiserror::Error;

use crate::api::ApiError;

/// Errors that can occur during authentication flows.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Too many recent failures; nothing was sent.
    #[error("too many attempts, retry in {}s", .retry_after.as_secs())]
    RateLimited {
        /// Time until the limiter admits another attempt.
        retry_after: Duration,
    },

    /// Input failed local validation; nothing was sent.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The endpoint refused the request.
    #[error("{0}")]
    Rejected(String),

    /// The endpoint accepted the request but the response lacks required fields.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Transport or decoding failure.
    #[error("api error: {0}")]
    Api(ApiError),
}

impl From<ApiError> for AuthError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Rejected(message) => Self::Rejected(message),
            other => Self::Api(other),
        }
    }
}
