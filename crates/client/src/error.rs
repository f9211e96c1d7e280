//! Unified error handling with Sentry integration.
//!
//! Flows return their own error types; callers that surface failures to a
//! person convert them into [`ClientError`] and show
//! [`ClientError::user_message`] after calling [`ClientError::report`].

use thiserror::Error;

use crate::api::ApiError;
use crate::config::ConfigError;
use crate::rate_limit::format_wait;
use crate::services::{AuthError, CheckoutError, OrderError};
use crate::storage::StorageError;

/// Client-level error type.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Persisted state could not be accessed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration is missing or invalid.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Remote endpoint failure outside a flow.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Authentication flow failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Checkout flow failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Order history request failed.
    #[error("Order error: {0}")]
    Orders(#[from] OrderError),
}

impl ClientError {
    /// Whether this error indicates a fault rather than an expected refusal.
    #[must_use]
    pub const fn is_unexpected(&self) -> bool {
        match self {
            Self::Storage(_) | Self::Config(_) => true,
            Self::Api(err) => !matches!(err, ApiError::Rejected(_)),
            Self::Auth(err) => matches!(err, AuthError::Api(_) | AuthError::MalformedResponse(_)),
            Self::Checkout(err) => matches!(err, CheckoutError::Api(_)),
            Self::Orders(err) => matches!(err, OrderError::Api(_)),
        }
    }

    /// Capture unexpected errors to Sentry and log them.
    pub fn report(&self) {
        if self.is_unexpected() {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Client error"
            );
        } else {
            tracing::debug!(error = %self, "Expected failure");
        }
    }

    /// Message safe to show a shopper. Internal details are not exposed.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Storage(_) => "Unable to access saved data".to_string(),
            Self::Config(_) => "The client is not configured".to_string(),
            Self::Api(ApiError::Rejected(message)) => message.clone(),
            Self::Api(_) => "Unable to reach the store. Please try again.".to_string(),
            Self::Auth(err) => match err {
                AuthError::RateLimited { retry_after } => format!(
                    "Too many attempts. Please wait {} before trying again.",
                    format_wait(*retry_after)
                ),
                AuthError::Rejected(message) => message.clone(),
                AuthError::InvalidInput(message) => message.clone(),
                AuthError::MalformedResponse(_) | AuthError::Api(_) => {
                    "Unable to sign in right now. Please try again.".to_string()
                }
            },
            Self::Checkout(err) => match err {
                CheckoutError::NotAuthenticated => "Please sign in to check out".to_string(),
                CheckoutError::EmptyCart => "Your cart is empty.".to_string(),
                CheckoutError::Rejected(_) | CheckoutError::Api(_) => {
                    "Unable to submit order. Please try again.".to_string()
                }
            },
            Self::Orders(err) => match err {
                OrderError::NotAuthenticated => "Please sign in to view your orders".to_string(),
                OrderError::NotCancellable { .. } => {
                    "Only pending orders can be cancelled.".to_string()
                }
                OrderError::Rejected(message) => message.clone(),
                OrderError::Api(_) => "Failed to load orders.".to_string(),
            },
        }
    }
}

/// Result type alias for `ClientError`.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Set the Sentry user context.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(email: Option<&str>, role: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            email: email.map(String::from),
            ..Default::default()
        }));
        scope.set_tag("role", role.to_string());
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
        scope.remove_tag("role");
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
