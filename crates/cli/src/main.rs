//! Tealtree CLI - Inspect and drive the persisted client state.
//!
//! # Usage
//!
//! ```bash
//! # Show and edit the cart
//! tt-cli cart list
//! tt-cli cart add p-100 --title "Teal mug" --price 12.50 --quantity 2
//! tt-cli cart set p-100 0
//!
//! # Sign in (password from TT_PASSWORD) and check out
//! tt-cli login -e ada@example.com
//! tt-cli checkout
//! tt-cli orders list
//! tt-cli orders cancel ORD-7
//!
//! # Ask the guard whether a page may render
//! tt-cli session check admin/dashboard.html -r admin
//!
//! # Inspect or clear a rate limiter
//! tt-cli limiter status
//! tt-cli limiter reset login
//! ```
//!
//! # Commands
//!
//! - `cart` - List and edit cart lines
//! - `session` - Show the session, print the token, run the guard
//! - `device-id` - Print the device identifier
//! - `limiter` - Inspect or reset the credential rate limiters
//! - `login`, `signup`, `verify`, `logout`, `delete-account` - Account flows
//! - `forgot-password`, `reset-password` - Password recovery
//! - `checkout` - Submit the cart as an order
//! - `orders` - List or cancel past orders

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tealtree_client::{ClientConfig, ClientState};

mod commands;
mod error;

use error::CliError;

#[derive(Parser)]
#[command(name = "tt-cli")]
#[command(author, version, about = "Tealtree client state tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List and edit the cart
    Cart {
        #[command(subcommand)]
        action: commands::cart::CartAction,
    },
    /// Inspect the stored session
    Session {
        #[command(subcommand)]
        action: commands::session::SessionAction,
    },
    /// Print the device identifier
    DeviceId,
    /// Inspect or reset credential rate limiters
    Limiter {
        #[command(subcommand)]
        action: commands::limiter::LimiterAction,
    },
    /// Sign in
    Login(commands::account::LoginArgs),
    /// Create an account
    Signup(commands::account::SignupArgs),
    /// Confirm a signup with the emailed code
    Verify(commands::account::VerifyArgs),
    /// Email a password reset code
    ForgotPassword(commands::account::ForgotArgs),
    /// Set a new password with an emailed reset code
    ResetPassword(commands::account::ResetArgs),
    /// Sign out
    Logout {
        /// Page the logout happens on
        #[arg(short, long, default_value = "index.html")]
        page: String,
    },
    /// Permanently delete the signed-in account
    DeleteAccount(commands::account::DeleteArgs),
    /// Submit the cart as an order
    Checkout,
    /// List or cancel your orders
    Orders {
        #[command(subcommand)]
        action: commands::order::OrdersAction,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Errors become Sentry events; swallowed storage warnings stay breadcrumbs.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR => sentry_tracing::EventFilter::Event,
        tracing::Level::WARN | tracing::Level::INFO => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let config = ClientConfig::from_env();

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = config.as_ref().ok().and_then(init_sentry);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tealtree_client=info,tt_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {e}");
            std::process::exit(2);
        }
    };

    let cli = Cli::parse();

    if let Err(e) = run(cli, &config).await {
        e.report();
        tracing::error!("Command failed: {}", e.user_message());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &ClientConfig) -> Result<(), CliError> {
    let state = ClientState::from_config(config);
    tracing::debug!(path = %config.state_path.display(), "Using state file");

    match cli.command {
        Commands::Cart { action } => commands::cart::run(&state, action)?,
        Commands::Session { action } => commands::session::run(&state, config, action)?,
        Commands::DeviceId => commands::session::device_id(&state),
        Commands::Limiter { action } => commands::limiter::run(&state, action)?,
        Commands::Login(args) => commands::account::login(&state, config, args).await?,
        Commands::Signup(args) => commands::account::signup(&state, config, args).await?,
        Commands::Verify(args) => commands::account::verify(&state, config, args).await?,
        Commands::ForgotPassword(args) => {
            commands::account::forgot_password(&state, config, args).await?;
        }
        Commands::ResetPassword(args) => {
            commands::account::reset_password(&state, config, args).await?;
        }
        Commands::Logout { page } => commands::account::logout(&state, config, &page)?,
        Commands::DeleteAccount(args) => {
            commands::account::delete_account(&state, config, args).await?;
        }
        Commands::Checkout => commands::order::checkout(&state, config).await?,
        Commands::Orders { action } => commands::order::run(&state, config, action).await?,
    }
    Ok(())
}
