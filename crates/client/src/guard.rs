//! Page-entry route guard.
//!
//! Each guarded page declares the roles permitted to view it and consults
//! [`AuthGuard::require_auth`] once at load. A denied outcome carries the
//! navigation the page must perform instead of rendering.
//!
//! Two areas exist: the privileged admin area (any path containing
//! `/admin/`) and the general storefront. Targets are resolved relative to
//! the current location, the same way a browser resolves a relative link.

use std::fmt;

use url::Url;

use tealtree_core::Role;

use crate::session::{Session, SessionStore};

/// Query parameter carrying the post-login return target.
pub const NEXT_PARAM: &str = "next";

/// Landing page used whenever a return target is missing or unsafe.
pub const DEFAULT_LANDING: &str = "index.html";

/// Site area a location belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Area {
    /// Public storefront pages.
    Storefront,
    /// Admin pages under `/admin/`.
    Admin,
}

impl Area {
    /// Classify `location`.
    #[must_use]
    pub fn of(location: &Url) -> Self {
        if location.path().contains("/admin/") {
            Self::Admin
        } else {
            Self::Storefront
        }
    }

    /// Login entry point, relative to a page in this area.
    #[must_use]
    pub const fn login_path(self) -> &'static str {
        match self {
            Self::Storefront => "login.html",
            Self::Admin => "../admin/login.html",
        }
    }

    /// Default landing page, relative to a page in this area.
    #[must_use]
    pub const fn landing_path(self) -> &'static str {
        match self {
            Self::Storefront => "index.html",
            Self::Admin => "../index.html",
        }
    }
}

/// Why the guard redirected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// No valid session.
    LoginRequired,
    /// The session role is not permitted on this page.
    RoleNotPermitted,
}

/// A navigation the caller must perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    /// Absolute destination.
    pub target: Url,
    /// Why navigation is required.
    pub reason: DenyReason,
}

impl fmt::Display for Navigation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.target.as_str())
    }
}

/// Result of a guard check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    /// The page may render for this session.
    Allowed(Session),
    /// The page must not render; navigate instead.
    Denied(Navigation),
}

impl GuardOutcome {
    /// The session, if allowed.
    #[must_use]
    pub fn session(self) -> Option<Session> {
        match self {
            Self::Allowed(session) => Some(session),
            Self::Denied(_) => None,
        }
    }

    /// The navigation, if denied.
    #[must_use]
    pub const fn navigation(&self) -> Option<&Navigation> {
        match self {
            Self::Allowed(_) => None,
            Self::Denied(navigation) => Some(navigation),
        }
    }
}

/// Session- and role-based page guard.
#[derive(Clone)]
pub struct AuthGuard {
    sessions: SessionStore,
}

impl AuthGuard {
    /// Create a guard reading sessions from `sessions`.
    #[must_use]
    pub const fn new(sessions: SessionStore) -> Self {
        Self { sessions }
    }

    /// Decide whether the page at `current` may render.
    ///
    /// Without a valid session, redirects to the area's login page; storefront
    /// pages attach their path and query as the `next` return target. With a
    /// session whose role is not in a non-empty `allowed_roles`, redirects to
    /// the area's landing page without touching the session.
    #[must_use]
    pub fn require_auth(&self, current: &Url, allowed_roles: &[Role]) -> GuardOutcome {
        let area = Area::of(current);

        let Some(session) = self.sessions.active() else {
            let mut target = resolve(current, area.login_path());
            if area == Area::Storefront {
                target
                    .query_pairs_mut()
                    .append_pair(NEXT_PARAM, &return_target(current));
            }
            tracing::debug!(page = %current.path(), "Guard denied: login required");
            return GuardOutcome::Denied(Navigation {
                target,
                reason: DenyReason::LoginRequired,
            });
        };

        if !allowed_roles.is_empty() && !allowed_roles.contains(&session.role) {
            tracing::debug!(
                page = %current.path(),
                role = %session.role,
                "Guard denied: role not permitted"
            );
            return GuardOutcome::Denied(Navigation {
                target: resolve(current, area.landing_path()),
                reason: DenyReason::RoleNotPermitted,
            });
        }

        GuardOutcome::Allowed(session)
    }

    /// Gate the cart page's checkout button.
    ///
    /// Returns the login navigation (returning to `checkout.html`) unless a
    /// valid customer session exists.
    #[must_use]
    pub fn checkout_gate(&self, current: &Url) -> Option<Navigation> {
        let is_customer = self
            .sessions
            .active()
            .is_some_and(|session| session.role == Role::Customer);
        if is_customer {
            return None;
        }

        let mut target = resolve(current, Area::Storefront.login_path());
        target
            .query_pairs_mut()
            .append_pair(NEXT_PARAM, "checkout.html");
        Some(Navigation {
            target,
            reason: DenyReason::LoginRequired,
        })
    }
}

/// Landing page of the area `current` belongs to, used after logout.
#[must_use]
pub fn landing_url(current: &Url) -> Url {
    resolve(current, Area::of(current).landing_path())
}

/// Path plus query of `location`, used as a login return target.
#[must_use]
pub fn return_target(location: &Url) -> String {
    match location.query() {
        Some(query) => format!("{}?{query}", location.path()),
        None => location.path().to_string(),
    }
}

/// Validate a caller-supplied return target.
///
/// Only path-relative references are accepted. Anything carrying a scheme
/// (`https:`, `javascript:`), a protocol-relative prefix (`//host`) or a
/// backslash prefix that browsers treat like one falls back to
/// [`DEFAULT_LANDING`]. So does any value containing a control character,
/// since URL parsers silently drop tabs and newlines. Accepted values are returned rooted at `/`.
///
/// ```
/// use tealtree_client::guard::safe_redirect;
///
/// assert_eq!(safe_redirect(Some("orders.html?x=1")), "/orders.html?x=1");
/// assert_eq!(safe_redirect(Some("//evil.example")), "index.html");
/// assert_eq!(safe_redirect(None), "index.html");
/// ```
#[must_use]
pub fn safe_redirect(next: Option<&str>) -> String {
    let Some(next) = next.map(str::trim).filter(|next| !next.is_empty()) else {
        return DEFAULT_LANDING.to_string();
    };

    if next.chars().any(char::is_control)
        || has_scheme(next)
        || next.starts_with("//")
        || next.starts_with("/\\")
        || next.starts_with('\\')
    {
        tracing::warn!(next, "Rejected unsafe return target");
        return DEFAULT_LANDING.to_string();
    }

    if next.starts_with('/') {
        next.to_string()
    } else {
        format!("/{next}")
    }
}

/// Whether `value` starts with `something:` before any path, query or
/// fragment delimiter.
fn has_scheme(value: &str) -> bool {
    value
        .find([':', '/', '?', '#'])
        .is_some_and(|pos| value.as_bytes().get(pos) == Some(&b':'))
}

fn resolve(current: &Url, relative: &str) -> Url {
    current.join(relative).unwrap_or_else(|e| {
        tracing::warn!(error = %e, base = %current, "Could not resolve guard target");
        current.clone()
    })
}

/// Visibility of the session-dependent navigation links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthLinks {
    /// Login and signup links.
    pub guest: bool,
    /// Logout link.
    pub logout: bool,
    /// Admin dashboard link.
    pub dashboard: bool,
    /// Customer account link.
    pub account: bool,
    /// Greeting shown next to the links.
    pub welcome: Option<String>,
}

impl AuthLinks {
    /// Links to show for `session`.
    #[must_use]
    pub fn for_session(session: Option<&Session>) -> Self {
        match session {
            Some(session) => Self {
                guest: false,
                logout: true,
                dashboard: session.role == Role::Admin,
                account: session.role == Role::Customer,
                welcome: Some(
                    session
                        .name
                        .as_deref()
                        .filter(|name| !name.is_empty())
                        .map_or_else(|| "Welcome back".to_string(), |name| format!("Welcome, {name}")),
                ),
            },
            None => Self {
                guest: true,
                logout: false,
                dashboard: false,
                account: false,
                welcome: None,
            },
        }
    }
}
