//! Command implementations.

pub mod account;
pub mod cart;
pub mod limiter;
pub mod order;
pub mod session;

use url::Url;

use tealtree_client::ClientConfig;
use tealtree_client::api::{ApiClient, HttpTransport};
use tealtree_client::state::ClientState;

use crate::error::CliError;

/// Resolve `page` against the configured site URL.
pub fn page_url(config: &ClientConfig, page: &str) -> Result<Url, CliError> {
    config
        .page_url(page)
        .map_err(|e| CliError::InvalidPage(page.to_string(), e))
}

/// Client for the configured remote endpoint.
pub fn api_client(
    state: &ClientState,
    config: &ClientConfig,
) -> Result<ApiClient<HttpTransport>, CliError> {
    let transport = HttpTransport::new(config.api_url()?.clone(), config.api_timeout)?;
    Ok(ApiClient::new(transport, state.clone()))
}
