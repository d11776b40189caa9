//! Path classification.
//!
//! Every path maps to exactly one class; the classes are a closed enum so
//! the access decision in `evaluator` can be checked for totality by the
//! compiler.

/// Access class of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    /// No access policy at all.
    Public,
    /// Login/signup pages; an authenticated user gets routed onward.
    AuthEntry,
    /// The profile-completion page itself.
    ProfileCompletion,
    /// The 2FA challenge page itself.
    TwoFactorChallenge,
    /// Requires full standing: token, profile, and 2FA when enabled.
    Protected,
}

pub const LOGIN_PATH: &str = "/";
pub const TWO_FACTOR_PATH: &str = "/verify-2fa";
pub const PROFILE_COMPLETION_PATH: &str = "/complete-profile";
pub const PROFILE_PATH: &str = "/profile";

const AUTH_ENTRY_PATHS: &[&str] = &["/", "/login", "/signup"];

const PROTECTED_PREFIXES: &[&str] = &[
    "/game",
    "/profile",
    "/settings",
    "/leaderboard",
    "/chat",
    "/channel",
];

/// Map a request path to its route class.
pub fn classify(path: &str) -> RouteClass {
    if AUTH_ENTRY_PATHS.contains(&path) {
        return RouteClass::AuthEntry;
    }
    if path == TWO_FACTOR_PATH {
        return RouteClass::TwoFactorChallenge;
    }
    if path == PROFILE_COMPLETION_PATH {
        return RouteClass::ProfileCompletion;
    }
    if PROTECTED_PREFIXES
        .iter()
        .any(|prefix| path == *prefix || path.starts_with(&format!("{}/", prefix)))
    {
        return RouteClass::Protected;
    }
    RouteClass::Public
}
