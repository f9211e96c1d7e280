//! Order placement from the cart.

use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::instrument;

use tealtree_core::{OrderId, Price, ProductId, Role};

use crate::api::{ApiClient, ApiError, Transport};
use crate::cart::{self, CartItem};
use crate::error::add_breadcrumb;

/// Errors that can occur while placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// No valid customer session.
    #[error("a customer session is required")]
    NotAuthenticated,

    /// Nothing to order.
    #[error("cart is empty")]
    EmptyCart,

    /// The endpoint refused the order.
    #[error("order rejected: {0}")]
    Rejected(String),

    /// Transport or decoding failure.
    #[error("api error: {0}")]
    Api(ApiError),
}

impl From<ApiError> for CheckoutError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Rejected(message) => Self::Rejected(message),
            other => Self::Api(other),
        }
    }
}

/// An order line as sent to the endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderLine {
    /// Product identifier.
    pub id: ProductId,
    /// Title at add-time.
    pub title: String,
    /// Units ordered.
    pub quantity: u32,
    /// Unit price at add-time.
    pub price: Price,
}

impl From<&CartItem> for OrderLine {
    fn from(item: &CartItem) -> Self {
        Self {
            id: item.id.clone(),
            title: item.title.clone(),
            quantity: item.quantity,
            price: item.price,
        }
    }
}

/// A successfully submitted order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedOrder {
    /// Identifier assigned by the endpoint, when it returns one.
    pub order_id: Option<OrderId>,
    /// Total submitted.
    pub total: Price,
}

/// Submit the cart as a pending order.
///
/// The cart is cleared only after the endpoint accepts the order.
///
/// # Errors
///
/// Returns `CheckoutError::NotAuthenticated` without a valid customer session
/// and `CheckoutError::EmptyCart` for an empty cart; nothing is sent in
/// either case.
#[instrument(skip(client))]
pub async fn place_order<T: Transport>(client: &ApiClient<T>) -> Result<PlacedOrder, CheckoutError> {
    let state = client.state();
    state
        .sessions()
        .active()
        .filter(|session| session.role == Role::Customer)
        .ok_or(CheckoutError::NotAuthenticated)?;

    let items = state.cart().list();
    if items.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    let lines: Vec<OrderLine> = items.iter().map(OrderLine::from).collect();
    let total = cart::subtotal(&items);
    let total_text = total.to_string();
    add_breadcrumb("checkout", "Submitting order", Some(&[("total", total_text.as_str())]));

    let response = client
        .request("createOrder", json!({ "items": lines, "total": total }))
        .await?
        .into_result()?;

    state.cart().clear();
    let order_id = response
        .field::<OrderId>("orderId")
        .or_else(|| response.field::<OrderId>("id"));
    tracing::info!(
        order_id = order_id.as_ref().map(OrderId::as_str),
        lines = lines.len(),
        %total,
        "Order placed"
    );

    Ok(PlacedOrder { order_id, total })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::api::testing::StubTransport;
    use crate::session::Session;
    use crate::state::ClientState;

    fn client_with(role: Option<Role>) -> ApiClient<StubTransport> {
        let state = ClientState::in_memory();
        if let Some(role) = role {
            state.sessions().write(Some(&Session {
                token: "tok".to_string(),
                expiry: Some("2999-01-01T00:00:00Z".to_string()),
                role,
                name: None,
                email: None,
            }));
        }
        ApiClient::new(StubTransport::new(), state)
    }

    fn item(id: &str, cents: i64, quantity: u32) -> CartItem {
        CartItem {
            id: ProductId::new(id),
            title: format!("Product {id}"),
            price: Price::from_cents(cents).unwrap(),
            image_url: None,
            quantity,
        }
    }

    #[tokio::test]
    async fn test_requires_customer_session() {
        let client = client_with(None);
        client.state().cart().add(item("p1", 500, 1));
        assert!(matches!(
            place_order(&client).await,
            Err(CheckoutError::NotAuthenticated)
        ));

        let client = client_with(Some(Role::Admin));
        client.state().cart().add(item("p1", 500, 1));
        assert!(matches!(
            place_order(&client).await,
            Err(CheckoutError::NotAuthenticated)
        ));
        assert!(client.transport().sent().is_empty());
    }

    #[tokio::test]
    async fn test_empty_cart() {
        let client = client_with(Some(Role::Customer));
        assert!(matches!(
            place_order(&client).await,
            Err(CheckoutError::EmptyCart)
        ));
        assert!(client.transport().sent().is_empty());
    }

    #[tokio::test]
    async fn test_sends_lines_and_total_then_clears_cart() {
        let client = client_with(Some(Role::Customer));
        client.state().cart().add(item("p1", 1250, 2));
        client.state().cart().add(item("p2", 300, 1));
        client
            .transport()
            .respond(json!({ "ok": true, "orderId": "ORD-42" }));

        let placed = place_order(&client).await.unwrap();

        assert_eq!(placed.order_id, Some(OrderId::new("ORD-42")));
        assert_eq!(placed.total.amount(), Decimal::new(2800, 2));
        assert!(client.state().cart().list().is_empty());

        let sent = client.transport().sent();
        let (_, payload) = sent.first().unwrap();
        assert_eq!(payload["action"], "createOrder");
        assert_eq!(payload["token"], "tok");
        assert_eq!(payload["total"], json!(28.0));
        assert_eq!(
            payload["items"],
            json!([
                { "id": "p1", "title": "Product p1", "quantity": 2, "price": 12.5 },
                { "id": "p2", "title": "Product p2", "quantity": 1, "price": 3.0 },
            ])
        );
    }

    #[tokio::test]
    async fn test_rejection_keeps_cart() {
        let client = client_with(Some(Role::Customer));
        client.state().cart().add(item("p1", 500, 1));
        client
            .transport()
            .respond(json!({ "ok": false, "error": "Out of stock" }));

        let err = place_order(&client).await.unwrap_err();

        assert!(matches!(err, CheckoutError::Rejected(ref m) if m == "Out of stock"));
        assert_eq!(client.state().cart().list().len(), 1);
    }
}
