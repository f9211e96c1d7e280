//! Advisory fixed-window rate limiter for credential-submission actions.
//!
//! Each limiter counts failed attempts for one action key in a persisted
//! `{attempts, firstAttemptTimestamp}` record. The window is evaluated lazily
//! on every read or write. A client can get up to `2 × limit` attempts across
//! a window seam.
//!
//! This limiter is per client profile only. It does not coordinate across
//! devices or survive cleared storage; the remote endpoint enforces the real
//! limit.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::storage::{self, StorageBackend, keys};

/// Persisted attempt counter for one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitState {
    /// Failed attempts in the current window (at least 1).
    pub attempts: u32,
    /// Epoch milliseconds of the first failure in the window.
    #[serde(alias = "firstAttempt")]
    pub first_attempt_timestamp: i64,
}

/// Credential-submission actions guarded by a limiter, with their limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitedAction {
    /// Customer login: 5 attempts per 5 minutes.
    Login,
    /// Admin login: 5 attempts per 5 minutes.
    AdminLogin,
    /// Customer signup: 5 attempts per hour.
    Signup,
    /// Admin signup: 5 attempts per hour.
    AdminSignup,
}

impl LimitedAction {
    /// All limited actions.
    pub const ALL: [Self; 4] = [
        Self::Login,
        Self::AdminLogin,
        Self::Signup,
        Self::AdminSignup,
    ];

    /// Action key used for the backend record and the remote action name.
    #[must_use]
    pub const fn key(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::AdminLogin => "adminLogin",
            Self::Signup => "signup",
            Self::AdminSignup => "adminSignup",
        }
    }

    /// Maximum failed attempts per window.
    #[must_use]
    pub const fn limit(&self) -> u32 {
        5
    }

    /// Window length.
    #[must_use]
    pub const fn window(&self) -> Duration {
        match self {
            Self::Login | Self::AdminLogin => Duration::from_secs(5 * 60),
            Self::Signup | Self::AdminSignup => Duration::from_secs(60 * 60),
        }
    }

    /// Look up an action by its key.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.key() == key)
    }
}

/// Fixed-window attempt counter for a single action key.
#[derive(Clone)]
pub struct RateLimiter {
    backend: Arc<dyn StorageBackend>,
    clock: Arc<dyn Clock>,
    key: String,
    storage_key: String,
    limit: u32,
    window_ms: i64,
}

impl RateLimiter {
    /// Create a limiter allowing `limit` failed attempts per `window` for `key`.
    #[must_use]
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        clock: Arc<dyn Clock>,
        key: impl Into<String>,
        limit: u32,
        window: Duration,
    ) -> Self {
        let key = key.into();
        Self {
            backend,
            clock,
            storage_key: keys::rate_limit(&key),
            key,
            limit,
            window_ms: i64::try_from(window.as_millis()).unwrap_or(i64::MAX),
        }
    }

    /// Create a limiter with the preset limits for `action`.
    #[must_use]
    pub fn for_action(
        backend: Arc<dyn StorageBackend>,
        clock: Arc<dyn Clock>,
        action: LimitedAction,
    ) -> Self {
        Self::new(backend, clock, action.key(), action.limit(), action.window())
    }

    /// The action key this limiter counts.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Maximum failed attempts per window.
    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.limit
    }

    /// The stored counter, if any. Never creates state.
    ///
    /// A counter whose window starts in the future reads as absent.
    #[must_use]
    pub fn state(&self) -> Option<RateLimitState> {
        let now = self.clock.now_millis();
        storage::load::<RateLimitState>(self.backend.as_ref(), &self.storage_key).filter(|state| {
            if state.first_attempt_timestamp > now {
                tracing::warn!(key = %self.key, "Ignoring attempt counter dated in the future");
                return false;
            }
            state.attempts >= 1
        })
    }

    /// Whether another attempt may be submitted now.
    ///
    /// An elapsed window is cleared here and reported as open.
    #[must_use]
    pub fn can_attempt(&self) -> bool {
        let Some(state) = self.state() else {
            return true;
        };

        if self.window_elapsed(&state, self.clock.now_millis()) {
            self.clear();
            return true;
        }

        state.attempts < self.limit
    }

    /// Count a failed attempt.
    pub fn record_failure(&self) {
        let now = self.clock.now_millis();
        let next = match self.state() {
            Some(state) if !self.window_elapsed(&state, now) => RateLimitState {
                attempts: state.attempts.saturating_add(1),
                ..state
            },
            _ => RateLimitState {
                attempts: 1,
                first_attempt_timestamp: now,
            },
        };

        tracing::debug!(
            key = %self.key,
            attempts = next.attempts,
            limit = self.limit,
            "Recorded failed attempt"
        );
        storage::save(self.backend.as_ref(), &self.storage_key, &next);
    }

    /// Forgive all prior failures.
    pub fn record_success(&self) {
        self.clear();
    }

    /// Milliseconds until the current window resets; `0` without state.
    #[must_use]
    pub fn remaining_ms(&self) -> u64 {
        self.state().map_or(0, |state| {
            let elapsed = self
                .clock
                .now_millis()
                .saturating_sub(state.first_attempt_timestamp);
            u64::try_from(self.window_ms.saturating_sub(elapsed)).unwrap_or(0)
        })
    }

    /// Time until the current window resets.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        Duration::from_millis(self.remaining_ms())
    }

    fn window_elapsed(&self, state: &RateLimitState, now: i64) -> bool {
        now.saturating_sub(state.first_attempt_timestamp) > self.window_ms
    }

    fn clear(&self) {
        storage::discard(self.backend.as_ref(), &self.storage_key);
    }
}

/// Render a wait time for a "please wait ..." message.
///
/// Rounds up to whole seconds, minutes or hours and pluralizes.
///
/// ```
/// use std::time::Duration;
/// use tealtree_client::rate_limit::format_wait;
///
/// assert_eq!(format_wait(Duration::ZERO), "a moment");
/// assert_eq!(format_wait(Duration::from_millis(1_500)), "2 seconds");
/// assert_eq!(format_wait(Duration::from_secs(61)), "2 minutes");
/// assert_eq!(format_wait(Duration::from_secs(3_600)), "1 hour");
/// ```
#[must_use]
pub fn format_wait(wait: Duration) -> String {
    if wait.is_zero() {
        return "a moment".to_string();
    }

    let seconds = wait.as_millis().div_ceil(1000);
    let (amount, unit) = if seconds >= 3600 {
        (seconds.div_ceil(3600), "hour")
    } else if seconds >= 60 {
        (seconds.div_ceil(60), "minute")
    } else {
        (seconds, "second")
    };

    let plural = if amount > 1 { "s" } else { "" };
    format!("{amount} {unit}{plural}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryBackend;

    const START_MS: i64 = 1_700_000_000_000;
    const WINDOW: Duration = Duration::from_millis(300_000);

    fn setup(limit: u32) -> (Arc<MemoryBackend>, Arc<ManualClock>, RateLimiter) {
        let backend = Arc::new(MemoryBackend::new());
        let clock = Arc::new(ManualClock::at_millis(START_MS));
        let limiter = RateLimiter::new(backend.clone(), clock.clone(), "login", limit, WINDOW);
        (backend, clock, limiter)
    }

    #[test]
    fn test_fresh_limiter_allows_and_creates_nothing() {
        let (backend, _, limiter) = setup(5);
        assert!(limiter.can_attempt());
        assert_eq!(limiter.remaining_ms(), 0);
        assert!(backend.is_empty());
    }

    #[test]
    fn test_future_dated_counter_never_blocks() {
        let (backend, clock, limiter) = setup(5);
        backend
            .set(
                &keys::rate_limit("login"),
                r#"{"attempts":5,"firstAttemptTimestamp":9000000000000000}"#,
            )
            .unwrap();

        assert_eq!(limiter.state(), None);
        assert!(limiter.can_attempt());
        assert_eq!(limiter.remaining_ms(), 0);

        limiter.record_failure();
        let state = limiter.state().unwrap();
        assert_eq!(state.attempts, 1);
        assert_eq!(state.first_attempt_timestamp, START_MS);

        clock.advance_millis(365 * 24 * 60 * 60 * 1000);
        assert!(limiter.can_attempt());
    }

    #[test]
    fn test_blocks_at_limit_and_success_forgives() {
        let (_, _, limiter) = setup(5);
        for _ in 0..4 {
            limiter.record_failure();
            assert!(limiter.can_attempt());
        }
        limiter.record_failure();
        assert!(!limiter.can_attempt());

        limiter.record_failure();
        assert!(!limiter.can_attempt());
        assert_eq!(limiter.state().unwrap().attempts, 6);

        limiter.record_success();
        assert!(limiter.can_attempt());
        assert_eq!(limiter.state(), None);
    }

    #[test]
    fn test_window_reset_after_window_elapses() {
        let (_, clock, limiter) = setup(5);
        for _ in 0..5 {
            limiter.record_failure();
        }
        assert!(!limiter.can_attempt());

        // Exactly at the window edge the window has not elapsed yet
        clock.set(chrono::DateTime::from_timestamp_millis(START_MS + 300_000).unwrap());
        assert!(!limiter.can_attempt());

        clock.advance_millis(1);
        assert!(limiter.can_attempt());
        assert_eq!(limiter.state(), None);

        limiter.record_failure();
        let state = limiter.state().unwrap();
        assert_eq!(state.attempts, 1);
        assert_eq!(state.first_attempt_timestamp, START_MS + 300_001);
    }

    #[test]
    fn test_failure_after_elapsed_window_starts_fresh_without_read() {
        let (_, clock, limiter) = setup(5);
        limiter.record_failure();
        limiter.record_failure();
        clock.advance_millis(300_001);

        limiter.record_failure();
        assert_eq!(limiter.state().unwrap().attempts, 1);
    }

    #[test]
    fn test_remaining_ms() {
        let (_, clock, limiter) = setup(5);
        limiter.record_failure();
        assert_eq!(limiter.remaining_ms(), 300_000);

        clock.advance_millis(120_000);
        assert_eq!(limiter.remaining_ms(), 180_000);
        assert_eq!(limiter.remaining(), Duration::from_secs(180));

        clock.advance_millis(500_000);
        assert_eq!(limiter.remaining_ms(), 0);
    }

    #[test]
    fn test_corrupt_state_is_treated_as_absent() {
        let (backend, _, limiter) = setup(1);
        let key = keys::rate_limit("login");

        backend.set(&key, "{not json").unwrap();
        assert!(limiter.can_attempt());
        assert_eq!(limiter.remaining_ms(), 0);

        backend.set(&key, r#"{"attempts":3}"#).unwrap();
        assert!(limiter.can_attempt());

        backend
            .set(&key, r#"{"attempts":"3","firstAttemptTimestamp":1}"#)
            .unwrap();
        assert!(limiter.can_attempt());

        backend
            .set(&key, r#"{"attempts":0,"firstAttemptTimestamp":1}"#)
            .unwrap();
        assert!(limiter.can_attempt());

        limiter.record_failure();
        assert_eq!(limiter.state().unwrap().attempts, 1);
    }

    #[test]
    fn test_reads_legacy_field_name() {
        let (backend, _, limiter) = setup(2);
        backend
            .set(
                &keys::rate_limit("login"),
                &format!(r#"{{"attempts":2,"firstAttempt":{START_MS}}}"#),
            )
            .unwrap();
        assert!(!limiter.can_attempt());
    }

    #[test]
    fn test_persisted_shape() {
        let (backend, _, limiter) = setup(5);
        limiter.record_failure();
        let raw = backend.get(&keys::rate_limit("login")).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["attempts"], 1);
        assert_eq!(value["firstAttemptTimestamp"], START_MS);
    }

    #[test]
    fn test_limiters_are_independent_per_key() {
        let (backend, clock, login) = setup(1);
        let signup = RateLimiter::for_action(backend, clock, LimitedAction::Signup);
        login.record_failure();
        assert!(!login.can_attempt());
        assert!(signup.can_attempt());
    }

    #[test]
    fn test_action_presets() {
        assert_eq!(LimitedAction::Login.window(), Duration::from_secs(300));
        assert_eq!(LimitedAction::AdminSignup.window(), Duration::from_secs(3600));
        assert_eq!(LimitedAction::from_key("adminLogin"), Some(LimitedAction::AdminLogin));
        assert_eq!(LimitedAction::from_key("checkout"), None);
    }

    #[test]
    fn test_format_wait() {
        assert_eq!(format_wait(Duration::ZERO), "a moment");
        assert_eq!(format_wait(Duration::from_millis(1)), "1 second");
        assert_eq!(format_wait(Duration::from_secs(59)), "59 seconds");
        assert_eq!(format_wait(Duration::from_secs(60)), "1 minute");
        assert_eq!(format_wait(Duration::from_secs(299)), "5 minutes");
        assert_eq!(format_wait(Duration::from_secs(3_601)), "2 hours");
    }
}
