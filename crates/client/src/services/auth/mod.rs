//! Authentication flows.
//!
//! Login and signup are throttled per device by the client-side limiters
//! before anything is sent; the endpoint remains the authority.

mod error;

pub use error::AuthError;

use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::instrument;
use url::Url;

use tealtree_core::Role;

use crate::api::{ApiClient, ApiResponse, Transport};
use crate::error::{clear_sentry_user, set_sentry_user};
use crate::guard::{landing_url, safe_redirect};
use crate::rate_limit::LimitedAction;
use crate::session::Session;
use crate::state::ClientState;

/// Page an admin lands on after signing in.
const ADMIN_LANDING: &str = "dashboard.html";

/// Message shown when the endpoint accepts a signup without one.
const DEFAULT_SIGNUP_MESSAGE: &str = "Account created. Check your email for a verification code.";

/// Shown for every accepted reset request, whether or not the account exists.
pub const RESET_REQUESTED_MESSAGE: &str = "If the email exists, a reset code has been sent.";

/// Which login or signup form is being submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginKind {
    /// Storefront customer.
    Customer,
    /// Admin area.
    Admin,
}

impl LoginKind {
    const fn login_action(self) -> LimitedAction {
        match self {
            Self::Customer => LimitedAction::Login,
            Self::Admin => LimitedAction::AdminLogin,
        }
    }

    const fn signup_action(self) -> LimitedAction {
        match self {
            Self::Customer => LimitedAction::Signup,
            Self::Admin => LimitedAction::AdminSignup,
        }
    }

    /// Where to go after a successful login.
    ///
    /// Customers return to the validated `next` target; admins always land on
    /// the dashboard.
    #[must_use]
    pub fn destination(self, next: Option<&str>) -> String {
        match self {
            Self::Customer => safe_redirect(next),
            Self::Admin => ADMIN_LANDING.to_string(),
        }
    }
}

/// Email and password as submitted.
pub struct Credentials {
    /// Account email, trimmed.
    pub email: String,
    /// Password, verbatim.
    pub password: SecretString,
}

impl Credentials {
    /// Create credentials, trimming the email.
    #[must_use]
    pub fn new(email: &str, password: impl Into<SecretString>) -> Self {
        Self {
            email: email.trim().to_string(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// A signup form submission.
pub struct NewAccount {
    /// Display name.
    pub name: String,
    /// Account email.
    pub email: String,
    /// Chosen password.
    pub password: SecretString,
    /// Password confirmation.
    pub confirm: SecretString,
}

impl NewAccount {
    fn validate(&self) -> Result<(), AuthError> {
        if self.password.expose_secret() != self.confirm.expose_secret() {
            return Err(AuthError::InvalidInput("Passwords do not match.".to_string()));
        }
        if !self.email.contains('@') {
            return Err(AuthError::InvalidInput(
                "A valid email address is required.".to_string(),
            ));
        }
        Ok(())
    }
}

/// A password reset confirmation.
pub struct PasswordReset {
    /// Account email.
    pub email: String,
    /// Reset code from the email.
    pub code: String,
    /// Replacement password, verbatim.
    pub new_password: SecretString,
}

impl std::fmt::Debug for PasswordReset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordReset")
            .field("email", &self.email)
            .field("code", &"[REDACTED]")
            .field("new_password", &"[REDACTED]")
            .finish()
    }
}

/// Sign in and store the issued session.
///
/// # Errors
///
/// Returns `AuthError::RateLimited` without contacting the endpoint while the
/// limiter is blocking. Any other failure counts against the limiter.
#[instrument(skip(client, credentials), fields(email = %credentials.email))]
pub async fn login<T: Transport>(
    client: &ApiClient<T>,
    kind: LoginKind,
    credentials: &Credentials,
) -> Result<Session, AuthError> {
    let state = client.state();
    let limiter = state.limiter(kind.login_action());
    if !limiter.can_attempt() {
        let retry_after = limiter.remaining();
        tracing::info!(retry_after_ms = limiter.remaining_ms(), "Login throttled");
        return Err(AuthError::RateLimited { retry_after });
    }

    let response = client
        .request(
            limiter.key(),
            json!({
                "email": credentials.email,
                "password": credentials.password.expose_secret(),
            }),
        )
        .await
        .map_err(AuthError::from)
        .and_then(|response| response.into_result().map_err(AuthError::from))
        .and_then(|response| session_from_response(&response));

    match response {
        Ok(session) => {
            state.sessions().write(Some(&session));
            limiter.record_success();
            set_sentry_user(session.email.as_deref(), &session.role);
            tracing::info!(role = %session.role, "Logged in");
            Ok(session)
        }
        Err(err) => {
            limiter.record_failure();
            tracing::warn!(error = %err, "Login failed");
            Err(err)
        }
    }
}

/// Register a new account. Returns the endpoint's confirmation message.
///
/// # Errors
///
/// Returns `AuthError::RateLimited` while throttled and
/// `AuthError::InvalidInput` for local validation failures; neither counts
/// as an attempt.
#[instrument(skip(client, account), fields(email = %account.email))]
pub async fn signup<T: Transport>(
    client: &ApiClient<T>,
    kind: LoginKind,
    account: &NewAccount,
) -> Result<String, AuthError> {
    let limiter = client.state().limiter(kind.signup_action());
    if !limiter.can_attempt() {
        return Err(AuthError::RateLimited {
            retry_after: limiter.remaining(),
        });
    }
    account.validate()?;

    let result = client
        .request(
            limiter.key(),
            json!({
                "name": account.name.trim(),
                "email": account.email.trim().to_lowercase(),
                "password": account.password.expose_secret(),
            }),
        )
        .await
        .map_err(AuthError::from)
        .and_then(|response| response.into_result().map_err(AuthError::from));

    match result {
        Ok(response) => {
            limiter.record_success();
            tracing::info!("Signup accepted");
            Ok(response
                .str_field("message")
                .unwrap_or(DEFAULT_SIGNUP_MESSAGE)
                .to_string())
        }
        Err(err) => {
            limiter.record_failure();
            tracing::warn!(error = %err, "Signup failed");
            Err(err)
        }
    }
}

/// Confirm a signup with the emailed code.
///
/// # Errors
///
/// Returns the endpoint's rejection or a transport failure.
#[instrument(skip(client, code))]
pub async fn verify_email<T: Transport>(
    client: &ApiClient<T>,
    email: &str,
    code: &str,
) -> Result<String, AuthError> {
    let response = client
        .request(
            "verifyEmail",
            json!({ "email": email.trim(), "code": code.trim() }),
        )
        .await?
        .into_result()?;
    Ok(response
        .str_field("message")
        .unwrap_or("Email verified")
        .to_string())
}

/// Ask for a password reset code to be emailed.
///
/// The returned message does not reveal whether the account exists.
///
/// # Errors
///
/// Returns the endpoint's rejection or a transport failure.
#[instrument(skip(client, email))]
pub async fn request_password_reset<T: Transport>(
    client: &ApiClient<T>,
    email: &str,
) -> Result<String, AuthError> {
    client
        .request("forgotPassword", json!({ "email": email.trim() }))
        .await?
        .into_result()?;
    tracing::info!("Password reset requested");
    Ok(RESET_REQUESTED_MESSAGE.to_string())
}

/// Set a new password using an emailed reset code.
///
/// # Errors
///
/// Returns `AuthError::InvalidInput` without contacting the endpoint when the
/// code or password is empty, otherwise the endpoint's rejection or a
/// transport failure.
#[instrument(skip(client, reset))]
pub async fn reset_password<T: Transport>(
    client: &ApiClient<T>,
    reset: &PasswordReset,
) -> Result<String, AuthError> {
    let code = reset.code.trim();
    if code.is_empty() {
        return Err(AuthError::InvalidInput("A reset code is required.".to_string()));
    }
    if reset.new_password.expose_secret().is_empty() {
        return Err(AuthError::InvalidInput("A new password is required.".to_string()));
    }

    let response = client
        .request(
            "resetPassword",
            json!({
                "email": reset.email.trim(),
                "resetCode": code,
                "newPassword": reset.new_password.expose_secret(),
            }),
        )
        .await?
        .into_result()?;
    tracing::info!("Password reset");
    Ok(response
        .str_field("message")
        .unwrap_or("Password updated")
        .to_string())
}

/// Sign out. Returns the landing page of the area `current` is in.
pub fn logout(state: &ClientState, current: &Url) -> Url {
    state.sessions().clear();
    clear_sentry_user();
    tracing::info!("Logged out");
    landing_url(current)
}

/// Permanently delete the signed-in account, then sign out.
///
/// # Errors
///
/// Returns the endpoint's rejection or a transport failure; the session is
/// kept in that case.
#[instrument(skip(client, password))]
pub async fn delete_account<T: Transport>(
    client: &ApiClient<T>,
    password: &SecretString,
    current: &Url,
) -> Result<Url, AuthError> {
    client
        .request(
            "deleteAccount",
            json!({ "password": password.expose_secret() }),
        )
        .await?
        .into_result()?;
    tracing::info!("Account deleted");
    Ok(logout(client.state(), current))
}

fn session_from_response(response: &ApiResponse) -> Result<Session, AuthError> {
    let token = response
        .str_field("token")
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AuthError::MalformedResponse("missing token".to_string()))?;
    let role = response
        .field::<Role>("role")
        .ok_or_else(|| AuthError::MalformedResponse("missing or unknown role".to_string()))?;

    Ok(Session {
        token: token.to_string(),
        expiry: response.str_field("expiry").map(String::from),
        role,
        name: response.str_field("name").map(String::from),
        email: response.str_field("email").map(String::from),
    })
}
