//! Route guards.
//!
//! [`edge_route`] runs before any page code and looks only at the `isAdmin`
//! cookie flag. [`SessionGuard`] runs before a protected view and checks the
//! stored session token itself.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::session::SessionStore;

pub const ENTRY_PAGE: &str = "/";
pub const DASHBOARD_PAGE: &str = "/dashboard";
pub const ADMIN_COOKIE: &str = "isAdmin";

/// Headers added to every dashboard page.
pub const NO_STORE_HEADERS: [(&str, &str); 3] = [
    ("Cache-Control", "no-store, no-cache, must-revalidate, proxy-revalidate"),
    ("Pragma", "no-cache"),
    ("Expires", "0"),
];

const UNGUARDED_PREFIXES: [&str; 4] = ["/api", "/_next/static", "/_next/image", "/favicon.ico"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeDecision {
    /// Outside the guard's reach.
    Skip,
    Redirect(&'static str),
    /// Serve the page; `no_store` adds [`NO_STORE_HEADERS`].
    Continue { no_store: bool },
}

impl EdgeDecision {
    /// Extra response headers for a page served under this decision.
    pub fn headers(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            EdgeDecision::Continue { no_store: true } => &NO_STORE_HEADERS,
            _ => &[],
        }
    }
}

/// `Set-Cookie` value that mirrors the admin flag to the browser.
pub fn admin_cookie_header(flag: Option<&str>) -> String {
    match flag {
        Some(value) => format!("{ADMIN_COOKIE}={value}; Path=/; SameSite=Lax"),
        None => format!("{ADMIN_COOKIE}=; Path=/; Max-Age=0"),
    }
}

/// Value of the `isAdmin` cookie, as the edge guard reads it.
pub fn admin_flag(cookie_value: Option<&str>) -> bool {
    cookie_value == Some("true")
}

pub fn edge_route(path: &str, is_admin: bool) -> EdgeDecision {
    if UNGUARDED_PREFIXES.iter().any(|p| path.starts_with(p)) {
        return EdgeDecision::Skip;
    }

    let is_public = path == ENTRY_PAGE || path == "/login";

    if is_public && is_admin {
        return EdgeDecision::Redirect(DASHBOARD_PAGE);
    }
    if !is_public && !is_admin && path.starts_with(DASHBOARD_PAGE) {
        return EdgeDecision::Redirect(ENTRY_PAGE);
    }

    EdgeDecision::Continue {
        no_store: path.contains(DASHBOARD_PAGE),
    }
}

/// Redirect issued when a protected view has no live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Redirect(pub &'static str);

pub struct SessionGuard<'a> {
    store: &'a SessionStore,
}

impl<'a> SessionGuard<'a> {
    pub fn new(store: &'a SessionStore) -> Self {
        Self { store }
    }

    /// The live token, or a redirect to the entry page after clearing
    /// whatever stale session was stored.
    pub fn require_at(&self, now: DateTime<Utc>) -> Result<String, Redirect> {
        match self.store.token_at(now) {
            Some(token) => Ok(token),
            None => {
                debug!("No live session, redirecting to entry page");
                self.store.clear();
                Err(Redirect(ENTRY_PAGE))
            }
        }
    }

    pub fn require(&self) -> Result<String, Redirect> {
        self.require_at(Utc::now())
    }
}
