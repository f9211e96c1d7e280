//! Checkout and order history commands.

use clap::Subcommand;

use tealtree_client::ClientConfig;
use tealtree_client::services::{checkout, orders};
use tealtree_client::state::ClientState;
use tealtree_core::OrderId;

use super::{api_client, page_url};
use crate::error::CliError;

/// Submit the cart, after the same gate the cart page applies.
#[allow(clippy::print_stdout)]
pub async fn checkout(state: &ClientState, config: &ClientConfig) -> Result<(), CliError> {
    let cart_page = page_url(config, "cart.html")?;
    if let Some(navigation) = state.guard().checkout_gate(&cart_page) {
        println!("Sign in first: {navigation}");
        return Ok(());
    }

    let client = api_client(state, config)?;
    let placed = checkout::place_order(&client).await?;

    match placed.order_id {
        Some(id) => println!("Order {id} placed, total {}.", placed.total),
        None => println!("Order placed, total {}.", placed.total),
    }
    println!("We will contact you with payment details.");
    Ok(())
}

#[derive(Subcommand)]
pub enum OrdersAction {
    /// List your orders
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Cancel a pending order
    Cancel {
        /// Order identifier
        id: String,
    },
}

#[allow(clippy::print_stdout)]
pub async fn run(
    state: &ClientState,
    config: &ClientConfig,
    action: OrdersAction,
) -> Result<(), CliError> {
    let client = api_client(state, config)?;

    match action {
        OrdersAction::List { json } => {
            let orders = orders::list_orders(&client).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&orders)?);
            } else if orders.is_empty() {
                println!("No orders yet.");
            } else {
                for order in &orders {
                    println!(
                        "{:<20} {:<25} {:>12} {}",
                        order.id.as_str(),
                        order.created_at.as_deref().unwrap_or("-"),
                        order.total.to_string(),
                        order
                            .status
                            .as_ref()
                            .map_or_else(|| "pending".to_string(), ToString::to_string)
                    );
                }
            }
        }
        OrdersAction::Cancel { id } => {
            let id = OrderId::new(id);
            let orders = orders::list_orders(&client).await?;
            let order = orders
                .iter()
                .find(|order| order.id == id)
                .ok_or_else(|| CliError::InvalidArgument(format!("no order {id}")))?;
            orders::cancel_order(&client, order).await?;
            println!("Order {id} cancelled.");
        }
    }
    Ok(())
}
