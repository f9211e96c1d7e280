//! Cart commands.
//!
//! # Usage
//!
//! ```bash
//! tt-cli cart list
//! tt-cli cart add p-100 --title "Teal mug" --price 12.50 --quantity 2
//! tt-cli cart set p-100 3
//! tt-cli cart remove p-100
//! tt-cli cart clear
//! ```

use std::str::FromStr;

use clap::Subcommand;
use rust_decimal::Decimal;

use tealtree_client::cart::CartItem;
use tealtree_client::state::ClientState;
use tealtree_core::{Price, ProductId};

use crate::error::CliError;

#[derive(Subcommand)]
pub enum CartAction {
    /// List cart lines
    List {
        /// Print the raw lines as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add units of a product, merging with an existing line
    Add {
        /// Product identifier
        id: String,

        /// Product title
        #[arg(short, long)]
        title: String,

        /// Unit price, e.g. 12.50
        #[arg(short, long, value_parser = parse_price)]
        price: Price,

        /// Units to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,

        /// Product image URL
        #[arg(long)]
        image: Option<String>,
    },
    /// Set a line's quantity (zero or less removes it)
    Set {
        /// Product identifier
        id: String,

        /// New quantity
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Remove a line
    Remove {
        /// Product identifier
        id: String,
    },
    /// Empty the cart
    Clear,
}

pub fn run(state: &ClientState, action: CartAction) -> Result<(), CliError> {
    let cart = state.cart();
    let subscription = cart.subscribe(|items| {
        tracing::debug!(lines = items.len(), "Cart updated");
    });

    match action {
        CartAction::List { json } => print_cart(&cart.list(), json)?,
        CartAction::Add {
            id,
            title,
            price,
            quantity,
            image,
        } => {
            cart.add(CartItem {
                id: ProductId::new(id),
                title,
                price,
                image_url: image,
                quantity,
            });
            print_cart(&cart.list(), false)?;
        }
        CartAction::Set { id, quantity } => {
            cart.set_quantity(&ProductId::new(id), quantity);
            print_cart(&cart.list(), false)?;
        }
        CartAction::Remove { id } => {
            cart.remove(&ProductId::new(id));
            print_cart(&cart.list(), false)?;
        }
        CartAction::Clear => cart.clear(),
    }

    cart.unsubscribe(subscription);
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_cart(items: &[CartItem], json: bool) -> Result<(), CliError> {
    if json {
        println!("{}", serde_json::to_string_pretty(items)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("Your cart is empty.");
        return Ok(());
    }

    for item in items {
        println!(
            "{:<16} {:<32} {:>4} x {:>10} = {:>10}",
            item.id,
            item.title,
            item.quantity,
            item.price.to_string(),
            item.line_total().to_string()
        );
    }
    println!(
        "{} items, subtotal {}",
        tealtree_client::cart::item_count(items),
        tealtree_client::cart::subtotal(items)
    );
    Ok(())
}

fn parse_price(value: &str) -> Result<Price, String> {
    let amount = Decimal::from_str(value.trim().trim_start_matches('$'))
        .map_err(|e| format!("not a price: {e}"))?;
    Price::new(amount).map_err(|e| e.to_string())
}
