//! Session store: the client's record of an authenticated identity.
//!
//! The session is created from a successful login response and persisted
//! whole under [`keys::SESSION`]. Validity is checked lazily: every
//! validating read ([`SessionStore::active`]) clears a session that is
//! missing its expiry, has an unparseable expiry, or has expired.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use tealtree_core::Role;

use crate::clock::Clock;
use crate::storage::{self, StorageBackend, keys};

/// Session-stored identity.
///
/// `Debug` is implemented manually to redact the token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer token issued by the remote endpoint.
    pub token: String,
    /// Expiry as issued by the endpoint (see [`parse_expiry`]).
    #[serde(default)]
    pub expiry: Option<String>,
    /// Account role.
    pub role: Role,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Account email.
    #[serde(default)]
    pub email: Option<String>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"[REDACTED]")
            .field("expiry", &self.expiry)
            .field("role", &self.role)
            .field("name", &self.name)
            .field("email", &self.email)
            .finish()
    }
}

/// Why a stored session was rejected by a validating read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionInvalid {
    /// Nothing usable is stored.
    Missing,
    /// The session carries no expiry.
    NoExpiry,
    /// The expiry could not be parsed.
    UnparseableExpiry,
    /// The expiry is at or before now.
    Expired,
}

impl Session {
    /// The parsed expiry instant, if the session has a parseable one.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expiry.as_deref().and_then(parse_expiry)
    }

    /// Check the session against `now`.
    ///
    /// # Errors
    ///
    /// Returns the reason the session is unusable. A session is only valid
    /// when its expiry parses and lies strictly after `now`.
    pub fn validate_at(&self, now: DateTime<Utc>) -> Result<(), SessionInvalid> {
        let raw = self.expiry.as_deref().ok_or(SessionInvalid::NoExpiry)?;
        let expires_at = parse_expiry(raw).ok_or(SessionInvalid::UnparseableExpiry)?;
        if expires_at <= now {
            return Err(SessionInvalid::Expired);
        }
        Ok(())
    }
}

/// Store owning the session record.
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn StorageBackend>,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    /// Create a store over `backend`, evaluating expiry against `clock`.
    #[must_use]
    pub fn new(backend: Arc<dyn StorageBackend>, clock: Arc<dyn Clock>) -> Self {
        Self { backend, clock }
    }

    /// Read the stored session without validating its expiry.
    ///
    /// Missing, unparseable and structurally incomplete records (no token,
    /// unknown role) all read as `None`.
    #[must_use]
    pub fn read(&self) -> Option<Session> {
        storage::load::<Session>(self.backend.as_ref(), keys::SESSION)
            .filter(|session| !session.token.is_empty())
    }

    /// Replace the stored session, or remove it when `session` is `None`.
    pub fn write(&self, session: Option<&Session>) {
        match session {
            Some(session) => {
                storage::save(self.backend.as_ref(), keys::SESSION, session);
                tracing::debug!(role = %session.role, "Session stored");
            }
            None => {
                storage::discard(self.backend.as_ref(), keys::SESSION);
                tracing::debug!("Session cleared");
            }
        }
    }

    /// Remove the stored session.
    pub fn clear(&self) {
        self.write(None);
    }

    /// Validating read.
    ///
    /// Returns the session only if it has an expiry strictly in the future.
    /// Otherwise the stored record is cleared and the reason returned.
    ///
    /// # Errors
    ///
    /// Returns the [`SessionInvalid`] reason the session was rejected.
    pub fn validate(&self) -> Result<Session, SessionInvalid> {
        let outcome = self
            .read()
            .ok_or(SessionInvalid::Missing)
            .and_then(|session| {
                session
                    .validate_at(self.clock.now())
                    .map(|()| session)
            });

        if let Err(reason) = outcome {
            if reason != SessionInvalid::Missing {
                tracing::info!(?reason, "Discarding invalid session");
            }
            self.clear();
        }

        outcome
    }

    /// The session if it is currently valid, clearing it otherwise.
    #[must_use]
    pub fn active(&self) -> Option<Session> {
        self.validate().ok()
    }

    /// The bearer token of a currently valid session.
    ///
    /// Clears the stored session as a side effect when it is missing an
    /// expiry, has an unparseable expiry, or has expired.
    #[must_use]
    pub fn current_token(&self) -> Option<SecretString> {
        self.active().map(|session| SecretString::from(session.token))
    }
}

/// Day-first formats issued by the remote endpoint, most specific first.
const DAY_FIRST_DATETIME_FORMATS: &[&str] = &["%d-%m-%Y %H:%M:%S", "%d-%m-%Y %H:%M"];
const DAY_FIRST_DATE_FORMAT: &str = "%d-%m-%Y";

/// Naive ISO-like formats, interpreted in local time.
const LOCAL_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse a session expiry.
///
/// Accepted, in order:
/// 1. Day-first `DD-MM-YYYY[ HH:MM[:SS]]` in the client's local time zone.
/// 2. RFC 3339 / ISO 8601 with an offset.
/// 3. RFC 2822.
/// 4. Naive `YYYY-MM-DD[ T]HH:MM[:SS[.fff]]` in local time.
/// 5. Date-only `YYYY-MM-DD` at UTC midnight.
///
/// Anything else, including out-of-range components such as `31-02-2030`,
/// fails to parse.
#[must_use]
pub fn parse_expiry(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    parse_day_first(value)
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
        .or_else(|| {
            DateTime::parse_from_rfc2822(value)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
        .or_else(|| {
            LOCAL_DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
                .and_then(local_to_utc)
        })
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
        })
}

fn parse_day_first(value: &str) -> Option<DateTime<Utc>> {
    let naive = DAY_FIRST_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, DAY_FIRST_DATE_FORMAT)
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;
    local_to_utc(naive)
}

/// Resolve a local wall-clock time. Times skipped by a DST transition do not
/// resolve; repeated times take the earlier instant.
fn local_to_utc(naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}
