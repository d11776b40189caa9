//! Reverse proxy to the upstream application.
//!
//! A request whose upstream answer is 401 is replayed at most once, after a
//! coordinated refresh. A second 401 propagates as-is; a failed refresh is
//! terminal and tells the client to re-authenticate.

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{header, request::Parts, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use service_core::error::AppError;

use crate::middleware::guard::attach_refreshed_cookies;
use crate::services::{credential_key, RefreshedSession};
use crate::utils::cookies::{
    cookie_value, replace_cookie, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE,
};
use crate::GatewayState;

/// Requests are buffered so they can be replayed after a refresh.
const MAX_PROXY_BODY_BYTES: usize = 10 * 1024 * 1024;

pub async fn proxy(State(state): State<GatewayState>, req: Request) -> Result<Response, AppError> {
    let (parts, body) = req.into_parts();
    let body_bytes = axum::body::to_bytes(body, MAX_PROXY_BODY_BYTES)
        .await
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("failed to buffer request body: {}", e)))?;

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let url = format!("{}{}", state.config.upstream.url, path_and_query);

    let mut cookie_header = parts
        .headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_string();
    let mut pending_cookies: Option<RefreshedSession> = None;
    let mut retried = false;

    loop {
        let upstream = send_upstream(&state, &parts, &url, &cookie_header, body_bytes.clone()).await?;

        let refresh_credential = cookie_value(&cookie_header, REFRESH_TOKEN_COOKIE);
        let wants_refresh =
            should_attempt_refresh(upstream.status(), retried, refresh_credential.is_some());
        if let (true, Some(refresh_token)) = (wants_refresh, refresh_credential) {
            let key = credential_key(&refresh_token);
            let auth = state.auth.clone();
            let cookies = cookie_header.clone();

            match state
                .refreshes
                .run(&key, move || async move { auth.refresh(&cookies).await })
                .await
            {
                Ok(refreshed) => {
                    cookie_header =
                        replace_cookie(&cookie_header, ACCESS_TOKEN_COOKIE, &refreshed.access_token);
                    pending_cookies = Some(refreshed);
                    retried = true;
                    continue;
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Coordinated refresh failed");
                    return Ok(reauthenticate_response());
                }
            }
        }

        let response = into_axum_response(upstream).await?;
        return Ok(attach_refreshed_cookies(response, pending_cookies));
    }
}

/// A 401 is only worth a refresh when this request has not been replayed yet
/// and a refresh credential is actually present.
fn should_attempt_refresh(status: StatusCode, retried: bool, has_refresh_cookie: bool) -> bool {
    status == StatusCode::UNAUTHORIZED && !retried && has_refresh_cookie
}

async fn send_upstream(
    state: &GatewayState,
    parts: &Parts,
    url: &str,
    cookie_header: &str,
    body: Bytes,
) -> Result<reqwest::Response, AppError> {
    let mut headers = parts.headers.clone();
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);
    headers.remove(header::COOKIE);
    if !cookie_header.is_empty() {
        let value = HeaderValue::from_str(cookie_header)
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("invalid cookie header: {}", e)))?;
        headers.insert(header::COOKIE, value);
    }

    state
        .http
        .request(parts.method.clone(), url)
        .headers(headers)
        .body(body)
        .send()
        .await
        .map_err(|e| {
            tracing::error!("Upstream request to {} failed: {}", url, e);
            AppError::BadGateway(e.to_string())
        })
}

async fn into_axum_response(upstream: reqwest::Response) -> Result<Response, AppError> {
    let status = upstream.status();
    let mut headers = upstream.headers().clone();
    headers.remove(header::TRANSFER_ENCODING);
    headers.remove(header::CONNECTION);
    headers.remove(header::CONTENT_LENGTH);

    let bytes = upstream
        .bytes()
        .await
        .map_err(|e| AppError::BadGateway(e.to_string()))?;

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

fn reauthenticate_response() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": "Session expired, please sign in again"
        })),
    )
        .into_response()
}
