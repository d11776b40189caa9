//! Cookie carrier for the token pair: http-only, SameSite=Lax, path `/`.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::services::jwt::TokenPair;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

/// Attach both auth cookies. Max-age mirrors each token's own expiry, so the
/// browser drops the cookie when the credential inside it dies.
pub fn set_auth_cookies(
    jar: CookieJar,
    tokens: &TokenPair,
    access_ttl_seconds: i64,
    secure: bool,
) -> CookieJar {
    jar.add(auth_cookie(
        ACCESS_TOKEN_COOKIE,
        tokens.access_token.clone(),
        access_ttl_seconds,
        secure,
    ))
    .add(auth_cookie(
        REFRESH_TOKEN_COOKIE,
        tokens.refresh_token.clone(),
        tokens.refresh_ttl_seconds,
        secure,
    ))
}

pub fn clear_auth_cookies(jar: CookieJar) -> CookieJar {
    jar.remove(removal_cookie(ACCESS_TOKEN_COOKIE))
        .remove(removal_cookie(REFRESH_TOKEN_COOKIE))
}

fn auth_cookie(name: &'static str, value: String, max_age_seconds: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::seconds(max_age_seconds))
        .build()
}

fn removal_cookie(name: &'static str) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, "");
    cookie.set_path("/");
    cookie
}
