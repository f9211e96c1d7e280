//! Client state shared by every page and flow.

use std::sync::Arc;
use std::time::Duration;

use crate::cart::CartStore;
use crate::clock::{Clock, SystemClock};
use crate::config::ClientConfig;
use crate::device::DeviceIdentity;
use crate::guard::AuthGuard;
use crate::rate_limit::{LimitedAction, RateLimiter};
use crate::session::SessionStore;
use crate::storage::{FileBackend, MemoryBackend, StorageBackend};

/// The client's stores, constructed once per process over one backend.
///
/// This struct is cheaply cloneable via `Arc`; clones share the same stores
/// (including cart subscribers).
#[derive(Clone)]
pub struct ClientState {
    inner: Arc<ClientStateInner>,
}

struct ClientStateInner {
    backend: Arc<dyn StorageBackend>,
    clock: Arc<dyn Clock>,
    sessions: SessionStore,
    cart: CartStore,
    device: DeviceIdentity,
    guard: AuthGuard,
}

impl ClientState {
    /// Create the client state over `backend`, reading time from `clock`.
    #[must_use]
    pub fn new(backend: Arc<dyn StorageBackend>, clock: Arc<dyn Clock>) -> Self {
        let sessions = SessionStore::new(Arc::clone(&backend), Arc::clone(&clock));
        let cart = CartStore::new(Arc::clone(&backend));
        let device = DeviceIdentity::new(Arc::clone(&backend));
        let guard = AuthGuard::new(sessions.clone());

        Self {
            inner: Arc::new(ClientStateInner {
                backend,
                clock,
                sessions,
                cart,
                device,
                guard,
            }),
        }
    }

    /// Ephemeral state on an in-memory backend and the system clock.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()), Arc::new(SystemClock))
    }

    /// Durable state in the file named by `config`.
    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(
            Arc::new(FileBackend::new(&config.state_path)),
            Arc::new(SystemClock),
        )
    }

    /// The storage backend.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.inner.backend
    }

    /// The clock.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.inner.clock
    }

    /// The session store.
    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.inner.sessions
    }

    /// The cart store.
    #[must_use]
    pub fn cart(&self) -> &CartStore {
        &self.inner.cart
    }

    /// The device identity.
    #[must_use]
    pub fn device(&self) -> &DeviceIdentity {
        &self.inner.device
    }

    /// The route guard.
    #[must_use]
    pub fn guard(&self) -> &AuthGuard {
        &self.inner.guard
    }

    /// The limiter for one of the preset credential actions.
    #[must_use]
    pub fn limiter(&self, action: LimitedAction) -> RateLimiter {
        RateLimiter::for_action(
            Arc::clone(&self.inner.backend),
            Arc::clone(&self.inner.clock),
            action,
        )
    }

    /// A limiter for an arbitrary action key.
    #[must_use]
    pub fn limiter_for(&self, key: &str, limit: u32, window: Duration) -> RateLimiter {
        RateLimiter::new(
            Arc::clone(&self.inner.backend),
            Arc::clone(&self.inner.clock),
            key,
            limit,
            window,
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn test_clones_share_stores() {
        let state = ClientState::in_memory();
        let clone = state.clone();

        let id = state.device().device_id();
        assert_eq!(clone.device().device_id(), id);

        state.limiter(LimitedAction::Login).record_failure();
        assert_eq!(
            clone.limiter(LimitedAction::Login).state().unwrap().attempts,
            1
        );
    }

    #[test]
    fn test_custom_limiter_uses_shared_clock() {
        let clock = Arc::new(ManualClock::at_millis(0));
        let state = ClientState::new(Arc::new(MemoryBackend::new()), clock.clone());
        let limiter = state.limiter_for("contact", 1, Duration::from_secs(10));

        limiter.record_failure();
        assert!(!limiter.can_attempt());
        clock.advance_millis(10_001);
        assert!(limiter.can_attempt());
    }
}
