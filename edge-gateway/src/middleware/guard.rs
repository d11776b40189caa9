//! Route guard: resolves the session, evaluates the access policy and either
//! forwards the request or answers with the verdict's redirect.

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::policy::route_class::{
    LOGIN_PATH, PROFILE_COMPLETION_PATH, PROFILE_PATH, TWO_FACTOR_PATH,
};
use crate::policy::{classify, evaluate, RouteClass, SessionState, Verdict};
use crate::services::{credential_key, RefreshedSession};
use crate::utils::cookies::{
    cookie_value, replace_cookie, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE,
};
use crate::GatewayState;

pub async fn route_guard(
    State(state): State<GatewayState>,
    mut req: Request,
    next: Next,
) -> Response {
    let class = classify(req.uri().path());
    if class == RouteClass::Public {
        return next.run(req).await;
    }

    let cookie_header = req
        .headers()
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_string();

    let (session_state, refreshed) = resolve_session(&state, &cookie_header).await;

    let verdict = evaluate(class, session_state);
    tracing::debug!(path = %req.uri().path(), ?class, ?verdict, "Access decision");

    let response = match verdict {
        Verdict::Allow => {
            // A refresh happened while resolving: forward the request with
            // the new access token, not the expired one.
            if let Some(ref r) = refreshed {
                let updated = replace_cookie(&cookie_header, ACCESS_TOKEN_COOKIE, &r.access_token);
                if let Ok(value) = HeaderValue::from_str(&updated) {
                    req.headers_mut().insert(header::COOKIE, value);
                }
            }
            next.run(req).await
        }
        Verdict::RedirectLogin => Redirect::to(LOGIN_PATH).into_response(),
        Verdict::RedirectProfileCompletion => {
            Redirect::to(PROFILE_COMPLETION_PATH).into_response()
        }
        Verdict::RedirectTwoFactor => Redirect::to(TWO_FACTOR_PATH).into_response(),
        Verdict::RedirectProfile => Redirect::to(PROFILE_PATH).into_response(),
    };

    attach_refreshed_cookies(response, refreshed)
}

/// Propagate rotated cookies to the browser, whatever the verdict was.
pub(crate) fn attach_refreshed_cookies(
    mut response: Response,
    refreshed: Option<RefreshedSession>,
) -> Response {
    if let Some(refreshed) = refreshed {
        for raw in &refreshed.set_cookies {
            if let Ok(value) = HeaderValue::from_str(raw) {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
        }
    }
    response
}

/// Resolve the session behind a Cookie header, refreshing once (through the
/// single-flight registry) when the access token is rejected and a refresh
/// cookie is present.
async fn resolve_session(
    state: &GatewayState,
    cookie_header: &str,
) -> (SessionState, Option<RefreshedSession>) {
    let has_access = cookie_value(cookie_header, ACCESS_TOKEN_COOKIE).is_some();
    let refresh_cookie = cookie_value(cookie_header, REFRESH_TOKEN_COOKIE);

    // Nothing to resolve with; skip the network round trip.
    if !has_access && refresh_cookie.is_none() {
        return (SessionState::anonymous(), None);
    }

    if has_access {
        match state.auth.fetch_session(cookie_header).await {
            Ok(Some(snapshot)) => return (snapshot.to_state(), None),
            // Access token rejected; try the refresh path below.
            Ok(None) => {}
            Err(e) => {
                tracing::error!(error = %e, "Session resolution failed");
                return (SessionState::anonymous(), None);
            }
        }
    }

    let Some(refresh_token) = refresh_cookie else {
        return (SessionState::anonymous(), None);
    };

    let key = credential_key(&refresh_token);
    let auth = state.auth.clone();
    let cookies = cookie_header.to_string();
    let outcome = state
        .refreshes
        .run(&key, move || async move { auth.refresh(&cookies).await })
        .await;

    match outcome {
        Ok(refreshed) => {
            let updated = replace_cookie(cookie_header, ACCESS_TOKEN_COOKIE, &refreshed.access_token);
            match state.auth.fetch_session(&updated).await {
                Ok(Some(snapshot)) => (snapshot.to_state(), Some(refreshed)),
                Ok(None) => (SessionState::anonymous(), Some(refreshed)),
                Err(e) => {
                    tracing::error!(error = %e, "Session resolution failed after refresh");
                    (SessionState::anonymous(), Some(refreshed))
                }
            }
        }
        Err(e) => {
            tracing::debug!(error = %e, "Refresh failed; session is anonymous");
            (SessionState::anonymous(), None)
        }
    }
}
