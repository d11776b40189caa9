use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::IntoResponse,
    Json,
};
use axum_extra::extract::cookie::CookieJar;

use crate::dtos::ErrorResponse;
use crate::services::{SessionClaims, TokenKind};
use crate::utils::ACCESS_TOKEN_COOKIE;
use crate::AppState;

/// Middleware to require a valid access token.
///
/// The token is taken from the `access_token` cookie (the normal carrier) or
/// a bearer Authorization header. An unverified-2FA token still passes here;
/// route-level gating on the 2FA flag is the edge layer's responsibility.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let jar = CookieJar::from_headers(req.headers());

    let cookie_token = jar.get(ACCESS_TOKEN_COOKIE).map(|c| c.value().to_string());
    let bearer_token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|value| value.to_string());

    let token = match cookie_token.or(bearer_token) {
        Some(token) => token,
        None => {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Missing access token".to_string(),
                }),
            ));
        }
    };

    let claims = match state.tokens.verify(&token, TokenKind::Access) {
        Ok(claims) => claims,
        Err(_) => {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid or expired token".to_string(),
                }),
            ));
        }
    };

    // Store claims in request extensions so handlers can access them
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Extractor to easily get claims in handlers
pub struct AuthUser(pub SessionClaims);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let claims = parts.extensions.get::<SessionClaims>().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "Auth claims missing from request extensions".to_string(),
            }),
        ))?;

        Ok(AuthUser(claims.clone()))
    }
}
