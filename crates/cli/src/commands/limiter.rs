//! Rate limiter commands.
//!
//! # Usage
//!
//! ```bash
//! tt-cli limiter status
//! tt-cli limiter status adminLogin
//! tt-cli limiter reset login
//! ```

use clap::Subcommand;

use tealtree_client::rate_limit::{LimitedAction, format_wait};
use tealtree_client::state::ClientState;

use crate::error::CliError;

#[derive(Subcommand)]
pub enum LimiterAction {
    /// Show failed attempts and remaining wait
    Status {
        /// Action key (`login`, `adminLogin`, `signup`, `adminSignup`); all if omitted
        action: Option<String>,
    },
    /// Forget recorded failures for an action
    Reset {
        /// Action key
        action: String,
    },
}

#[allow(clippy::print_stdout)]
pub fn run(state: &ClientState, action: LimiterAction) -> Result<(), CliError> {
    match action {
        LimiterAction::Status { action } => {
            let actions = match action {
                Some(key) => vec![parse_action(&key)?],
                None => LimitedAction::ALL.to_vec(),
            };
            for action in actions {
                let limiter = state.limiter(action);
                let attempts = limiter.state().map_or(0, |s| s.attempts);
                let status = if limiter.can_attempt() {
                    "open".to_string()
                } else {
                    format!("blocked for {}", format_wait(limiter.remaining()))
                };
                println!(
                    "{:<12} {attempts}/{} failures  {status}",
                    limiter.key(),
                    limiter.limit()
                );
            }
        }
        LimiterAction::Reset { action } => {
            let limiter = state.limiter(parse_action(&action)?);
            limiter.record_success();
            tracing::info!(action = limiter.key(), "Limiter reset");
        }
    }
    Ok(())
}

fn parse_action(key: &str) -> Result<LimitedAction, CliError> {
    LimitedAction::from_key(key).ok_or_else(|| {
        CliError::InvalidArgument(format!(
            "unknown action {key}; expected one of {}",
            LimitedAction::ALL
                .iter()
                .map(LimitedAction::key)
                .collect::<Vec<_>>()
                .join(", ")
        ))
    })
}
