//! Account and order flows built on the stores and the remote endpoint.

pub mod auth;
pub mod checkout;
pub mod orders;

pub use auth::{AuthError, Credentials, LoginKind, NewAccount, PasswordReset};
pub use checkout::{CheckoutError, OrderLine, PlacedOrder};
pub use orders::{OrderError, OrderStatus, OrderSummary};
