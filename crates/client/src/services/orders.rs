//! Order history for the signed-in customer.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::instrument;

use tealtree_core::{OrderId, Price, Role};

use crate::api::{ApiClient, ApiError, Transport};

/// Errors that can occur while reading or changing past orders.
#[derive(Debug, Error)]
pub enum OrderError {
    /// No valid customer session.
    #[error("a customer session is required")]
    NotAuthenticated,

    /// The order has moved past the point where it can be cancelled.
    #[error("order {id} is {status} and can no longer be cancelled")]
    NotCancellable { id: OrderId, status: OrderStatus },

    /// The endpoint refused the request.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// Transport or decoding failure.
    #[error("api error: {0}")]
    Api(ApiError),
}

impl From<ApiError> for OrderError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Rejected(message) => Self::Rejected(message),
            other => Self::Api(other),
        }
    }
}

/// Fulfilment status reported by the endpoint. Matching is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Delivered,
    Cancelled,
    /// Any status this client does not know, as received.
    Other(String),
}

impl OrderStatus {
    /// Only pending orders may be cancelled by the customer.
    #[must_use]
    pub const fn is_cancellable(&self) -> bool {
        matches!(self, Self::Pending)
    }

    fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for OrderStatus {
    fn from(raw: String) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "pending" => Self::Pending,
            "confirmed" => Self::Confirmed,
            "delivered" => Self::Delivered,
            "cancelled" => Self::Cancelled,
            _ => Self::Other(raw),
        }
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the customer's order history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrderSummary {
    #[serde(rename = "ID")]
    pub id: OrderId,
    /// Creation time as issued by the endpoint.
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub total: Price,
    /// Absent when the endpoint has not assigned one; such orders are not
    /// cancellable.
    #[serde(default)]
    pub status: Option<OrderStatus>,
}

impl OrderSummary {
    #[must_use]
    pub fn can_cancel(&self) -> bool {
        self.status.as_ref().is_some_and(OrderStatus::is_cancellable)
    }
}

fn require_customer<T: Transport>(client: &ApiClient<T>) -> Result<(), OrderError> {
    client
        .state()
        .sessions()
        .active()
        .filter(|session| session.role == Role::Customer)
        .map(|_| ())
        .ok_or(OrderError::NotAuthenticated)
}

/// The signed-in customer's orders, as listed by the endpoint.
///
/// Entries that do not decode are skipped.
///
/// # Errors
///
/// Returns `OrderError::NotAuthenticated` without a customer session, or the
/// endpoint's rejection or a transport failure.
#[instrument(skip(client))]
pub async fn list_orders<T: Transport>(client: &ApiClient<T>) -> Result<Vec<OrderSummary>, OrderError> {
    require_customer(client)?;

    let response = client
        .request("listMyOrders", Value::Null)
        .await?
        .into_result()?;

    let raw = response.field::<Vec<Value>>("orders").unwrap_or_default();
    let orders: Vec<OrderSummary> = raw
        .into_iter()
        .filter_map(|value| {
            serde_json::from_value(value)
                .map_err(|e| tracing::warn!(error = %e, "Skipping malformed order entry"))
                .ok()
        })
        .collect();

    tracing::debug!(count = orders.len(), "Listed orders");
    Ok(orders)
}

/// Cancel `order`. Only pending orders are sent to the endpoint.
///
/// # Errors
///
/// Returns `OrderError::NotCancellable` for any other status without
/// contacting the endpoint, `OrderError::NotAuthenticated` without a customer
/// session, or the endpoint's rejection or a transport failure.
#[instrument(skip(client, order), fields(order_id = %order.id))]
pub async fn cancel_order<T: Transport>(
    client: &ApiClient<T>,
    order: &OrderSummary,
) -> Result<(), OrderError> {
    require_customer(client)?;
    if !order.can_cancel() {
        return Err(OrderError::NotCancellable {
            id: order.id.clone(),
            status: order
                .status
                .clone()
                .unwrap_or_else(|| OrderStatus::Other("unknown".to_string())),
        });
    }

    client
        .request("cancelOrder", json!({ "orderId": order.id }))
        .await?
        .into_result()?;
    tracing::info!("Order cancelled");
    Ok(())
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

    fn order(id: &str, status: Option<OrderStatus>) -> OrderSummary {
        OrderSummary {
            id: OrderId::new(id),
            created_at: None,
            total: Price::ZERO,
            status,
        }
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(OrderStatus::from("PENDING".to_string()), OrderStatus::Pending);
        assert_eq!(OrderStatus::from(" Delivered".to_string()), OrderStatus::Delivered);
        assert_eq!(
            OrderStatus::from("On hold".to_string()),
            OrderStatus::Other("On hold".to_string())
        );
        assert!(OrderStatus::Pending.is_cancellable());
        assert!(!OrderStatus::Confirmed.is_cancellable());
        assert!(!order("o", None).can_cancel());
    }

    #[tokio::test]
    async fn test_list_orders_decodes_and_skips_bad_entries() {
        let client = client_with(Some(Role::Customer));
        client.transport().respond(json!({
            "ok": true,
            "orders": [
                { "ID": "ORD-1", "CreatedAt": "2030-03-18T09:00:00Z", "Total": 28.5, "Status": "Pending" },
                { "ID": "ORD-2", "Total": 12, "Status": "delivered" },
                { "Total": 3 },
            ],
        }));

        let orders = list_orders(&client).await.unwrap();

        assert_eq!(orders.len(), 2);
        let first = orders.first().unwrap();
        assert_eq!(first.id, OrderId::new("ORD-1"));
        assert_eq!(first.total.amount(), Decimal::new(285, 1));
        assert!(first.can_cancel());
        assert_eq!(orders.get(1).unwrap().status, Some(OrderStatus::Delivered));

        let sent = client.transport().sent();
        let (_, payload) = sent.first().unwrap();
        assert_eq!(payload["action"], "listMyOrders");
        assert_eq!(payload["token"], "tok");
    }

    #[tokio::test]
    async fn test_list_orders_without_orders_field_is_empty() {
        let client = client_with(Some(Role::Customer));
        client.transport().respond(json!({ "ok": true }));
        assert!(list_orders(&client).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_orders_requires_customer() {
        let client = client_with(Some(Role::Admin));
        assert!(matches!(
            list_orders(&client).await,
            Err(OrderError::NotAuthenticated)
        ));
        assert!(client.transport().sent().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_pending_order() {
        let client = client_with(Some(Role::Customer));

        cancel_order(&client, &order("ORD-1", Some(OrderStatus::Pending)))
            .await
            .unwrap();

        let sent = client.transport().sent();
        let (_, payload) = sent.first().unwrap();
        assert_eq!(payload["action"], "cancelOrder");
        assert_eq!(payload["orderId"], "ORD-1");
    }

    #[tokio::test]
    async fn test_cancel_refuses_settled_orders_locally() {
        let client = client_with(Some(Role::Customer));

        for status in [Some(OrderStatus::Confirmed), Some(OrderStatus::Cancelled), None] {
            let err = cancel_order(&client, &order("ORD-2", status)).await.unwrap_err();
            assert!(matches!(err, OrderError::NotCancellable { .. }));
        }
        assert!(client.transport().sent().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_rejection() {
        let client = client_with(Some(Role::Customer));
        client
            .transport()
            .respond(json!({ "ok": false, "error": "Unable to cancel order" }));

        let err = cancel_order(&client, &order("ORD-1", Some(OrderStatus::Pending)))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::Rejected(ref m) if m == "Unable to cancel order"));
    }
}
