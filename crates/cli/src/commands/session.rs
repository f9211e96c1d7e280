//! Session and device commands.
//!
//! # Usage
//!
//! ```bash
//! tt-cli session show
//! tt-cli session token
//! tt-cli session check account.html -r customer
//! tt-cli device-id
//! ```

use clap::Subcommand;
use secrecy::ExposeSecret;

use tealtree_client::ClientConfig;
use tealtree_client::guard::{AuthLinks, GuardOutcome};
use tealtree_client::state::ClientState;
use tealtree_core::Role;

use super::page_url;
use crate::error::CliError;

#[derive(Subcommand)]
pub enum SessionAction {
    /// Show the stored session and whether it is still valid
    Show,
    /// Print the bearer token of a valid session
    Token,
    /// Run the page guard for a page
    Check {
        /// Page path relative to the site URL, e.g. `admin/dashboard.html`
        page: String,

        /// Roles allowed on the page (any role if omitted)
        #[arg(short, long = "role")]
        roles: Vec<Role>,
    },
}

#[allow(clippy::print_stdout)]
pub fn run(state: &ClientState, config: &ClientConfig, action: SessionAction) -> Result<(), CliError> {
    let sessions = state.sessions();

    match action {
        SessionAction::Show => {
            let Some(stored) = sessions.read() else {
                println!("No session.");
                return Ok(());
            };
            println!("Role:    {}", stored.role);
            println!("Name:    {}", stored.name.as_deref().unwrap_or("-"));
            println!("Email:   {}", stored.email.as_deref().unwrap_or("-"));
            println!("Expiry:  {}", stored.expiry.as_deref().unwrap_or("-"));
            match sessions.validate() {
                Ok(_) => println!("Status:  valid"),
                Err(reason) => println!("Status:  {reason:?} (cleared)"),
            }
            if let Some(welcome) = AuthLinks::for_session(sessions.active().as_ref()).welcome {
                println!("{welcome}");
            }
        }
        SessionAction::Token => match sessions.current_token() {
            Some(token) => println!("{}", token.expose_secret()),
            None => println!("No valid session."),
        },
        SessionAction::Check { page, roles } => {
            let current = page_url(config, &page)?;
            match state.guard().require_auth(&current, &roles) {
                GuardOutcome::Allowed(session) => println!("allowed ({})", session.role),
                GuardOutcome::Denied(navigation) => {
                    println!("redirect {} ({:?})", navigation.target, navigation.reason);
                }
            }
        }
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
pub fn device_id(state: &ClientState) {
    println!("{}", state.device().device_id());
}
