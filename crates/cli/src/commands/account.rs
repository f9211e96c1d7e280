//! Account commands.
//!
//! Passwords are read from the environment so they never appear in shell
//! history.
//!
//! # Usage
//!
//! ```bash
//! TT_PASSWORD=... tt-cli login -e ada@example.com --next checkout.html
//! TT_PASSWORD=... tt-cli login -e admin@example.com --admin
//! TT_PASSWORD=... tt-cli signup -n "Ada" -e ada@example.com
//! tt-cli verify -e ada@example.com -c 123456
//! tt-cli forgot-password -e ada@example.com
//! TT_PASSWORD=... tt-cli reset-password -e ada@example.com -c 654321
//! tt-cli logout -p admin/dashboard.html
//! TT_PASSWORD=... tt-cli delete-account
//! ```

use clap::Args;
use secrecy::SecretString;

use tealtree_client::ClientConfig;
use tealtree_client::services::auth;
use tealtree_client::services::{Credentials, LoginKind, NewAccount, PasswordReset};
use tealtree_client::state::ClientState;

use super::{api_client, page_url};
use crate::error::CliError;

#[derive(Args)]
pub struct LoginArgs {
    /// Account email
    #[arg(short, long)]
    email: String,

    /// Account password
    #[arg(long, env = "TT_PASSWORD", hide_env_values = true)]
    password: String,

    /// Sign in to the admin area
    #[arg(long)]
    admin: bool,

    /// Return target after a customer login
    #[arg(long)]
    next: Option<String>,
}

#[derive(Args)]
pub struct SignupArgs {
    /// Display name
    #[arg(short, long)]
    name: String,

    /// Account email
    #[arg(short, long)]
    email: String,

    /// Chosen password
    #[arg(long, env = "TT_PASSWORD", hide_env_values = true)]
    password: String,

    /// Password confirmation (defaults to the password)
    #[arg(long, env = "TT_PASSWORD_CONFIRM", hide_env_values = true)]
    confirm: Option<String>,

    /// Register an admin account
    #[arg(long)]
    admin: bool,
}

#[derive(Args)]
pub struct VerifyArgs {
    /// Account email
    #[arg(short, long)]
    email: String,

    /// Verification code from the email
    #[arg(short, long)]
    code: String,
}

#[derive(Args)]
pub struct ForgotArgs {
    /// Account email
    #[arg(short, long)]
    email: String,
}

#[derive(Args)]
pub struct ResetArgs {
    /// Account email
    #[arg(short, long)]
    email: String,

    /// Reset code from the email
    #[arg(short, long)]
    code: String,

    /// New password
    #[arg(long, env = "TT_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Args)]
pub struct DeleteArgs {
    /// Account password
    #[arg(long, env = "TT_PASSWORD", hide_env_values = true)]
    password: String,

    /// Page the deletion happens on
    #[arg(short, long, default_value = "account.html")]
    page: String,
}

const fn kind(admin: bool) -> LoginKind {
    if admin { LoginKind::Admin } else { LoginKind::Customer }
}

#[allow(clippy::print_stdout)]
pub async fn login(state: &ClientState, config: &ClientConfig, args: LoginArgs) -> Result<(), CliError> {
    let client = api_client(state, config)?;
    let kind = kind(args.admin);
    let credentials = Credentials::new(&args.email, args.password);

    let session = auth::login(&client, kind, &credentials).await?;
    let destination = page_url(config, &kind.destination(args.next.as_deref()))?;

    println!(
        "Signed in as {} ({})",
        session.email.as_deref().unwrap_or(&credentials.email),
        session.role
    );
    println!("Continue to {destination}");
    Ok(())
}

#[allow(clippy::print_stdout)]
pub async fn signup(state: &ClientState, config: &ClientConfig, args: SignupArgs) -> Result<(), CliError> {
    let client = api_client(state, config)?;
    let confirm = args.confirm.unwrap_or_else(|| args.password.clone());
    let account = NewAccount {
        name: args.name,
        email: args.email,
        password: SecretString::from(args.password),
        confirm: SecretString::from(confirm),
    };

    let message = auth::signup(&client, kind(args.admin), &account).await?;
    println!("{message}");
    Ok(())
}

#[allow(clippy::print_stdout)]
pub async fn verify(state: &ClientState, config: &ClientConfig, args: VerifyArgs) -> Result<(), CliError> {
    let client = api_client(state, config)?;
    let message = auth::verify_email(&client, &args.email, &args.code).await?;
    println!("{message}");
    Ok(())
}

#[allow(clippy::print_stdout)]
pub async fn forgot_password(
    state: &ClientState,
    config: &ClientConfig,
    args: ForgotArgs,
) -> Result<(), CliError> {
    let client = api_client(state, config)?;
    let message = auth::request_password_reset(&client, &args.email).await?;
    println!("{message}");
    Ok(())
}

#[allow(clippy::print_stdout)]
pub async fn reset_password(
    state: &ClientState,
    config: &ClientConfig,
    args: ResetArgs,
) -> Result<(), CliError> {
    let client = api_client(state, config)?;
    let reset = PasswordReset {
        email: args.email,
        code: args.code,
        new_password: SecretString::from(args.password),
    };
    let message = auth::reset_password(&client, &reset).await?;
    println!("{message}");
    Ok(())
}

#[allow(clippy::print_stdout)]
pub fn logout(state: &ClientState, config: &ClientConfig, page: &str) -> Result<(), CliError> {
    let landing = auth::logout(state, &page_url(config, page)?);
    println!("Signed out. Continue to {landing}");
    Ok(())
}

#[allow(clippy::print_stdout)]
pub async fn delete_account(
    state: &ClientState,
    config: &ClientConfig,
    args: DeleteArgs,
) -> Result<(), CliError> {
    let client = api_client(state, config)?;
    let current = page_url(config, &args.page)?;
    let password = SecretString::from(args.password);

    let landing = auth::delete_account(&client, &password, &current).await?;
    println!("Your account has been deleted. Continue to {landing}");
    Ok(())
}
