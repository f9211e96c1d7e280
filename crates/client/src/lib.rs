//! Tealtree client library.
//!
//! Client-resident persistence and guard layer for the storefront: the
//! session, cart, device identity and per-action rate limiters all live in
//! one injectable key-value backend, and a route guard decides page access
//! from the stored session.
//!
//! # Modules
//!
//! - [`storage`] - Backend trait plus file and in-memory backends
//! - [`session`], [`cart`], [`rate_limit`], [`device`] - The stores
//! - [`guard`] - Page-entry guard and return-target validation
//! - [`api`] - Remote action endpoint
//! - [`services`] - Login, signup, logout, account deletion and checkout flows
//! - [`state`] - Stores bundled over one backend

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod clock;
pub mod config;
pub mod device;
pub mod error;
pub mod guard;
pub mod rate_limit;
pub mod services;
pub mod session;
pub mod state;
pub mod storage;

pub use api::{ApiClient, ApiError, ApiResponse, HttpTransport, Method, Transport};
pub use cart::{CartItem, CartStore, SubscriptionId};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ClientConfig, ConfigError};
pub use device::{ANONYMOUS_DEVICE_ID, DeviceIdentity};
pub use error::ClientError;
pub use guard::{AuthGuard, AuthLinks, DenyReason, GuardOutcome, Navigation};
pub use rate_limit::{LimitedAction, RateLimitState, RateLimiter};
pub use session::{Session, SessionInvalid, SessionStore};
pub use state::ClientState;
pub use storage::{FileBackend, MemoryBackend, StorageBackend, StorageError};
