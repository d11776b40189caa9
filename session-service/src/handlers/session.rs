use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use service_core::error::AppError;

use crate::{
    dtos::auth::{LoginRequest, LoginResponse, MeResponse, MessageResponse, SignUpRequest},
    dtos::ErrorResponse,
    middleware::AuthUser,
    services::{ServiceError, TokenKind},
    utils::{clear_auth_cookies, set_auth_cookies, ValidatedJson, REFRESH_TOKEN_COOKIE},
    AppState,
};

/// Register a new account and start an (unverified) session
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignUpRequest,
    responses(
        (status = 201, description = "User created, session cookies set", body = MessageResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Session"
)]
pub async fn sign_up(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<SignUpRequest>,
) -> Result<impl IntoResponse, AppError> {
    let tokens = state.sessions.sign_up(&req.email, &req.password).await?;

    let jar = set_auth_cookies(
        jar,
        &tokens,
        state.tokens.access_token_expiry_seconds(),
        state.config.security.secure_cookies,
    );

    Ok((
        StatusCode::CREATED,
        jar,
        Json(MessageResponse {
            message: "User created successfully".to_string(),
        }),
    ))
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful, session cookies set", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Session"
)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state.sessions.login(&req.email, &req.password).await?;

    let jar = set_auth_cookies(
        jar,
        &outcome.tokens,
        state.tokens.access_token_expiry_seconds(),
        state.config.security.secure_cookies,
    );

    let message = if outcome.requires_two_factor {
        "Please verify 2FA code"
    } else {
        "Login successful"
    };

    Ok((
        StatusCode::OK,
        jar,
        Json(LoginResponse {
            requires_two_factor: outcome.requires_two_factor,
            message: message.to_string(),
        }),
    ))
}

/// Rotate the session: mint a new token pair from the refresh cookie
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "Tokens refreshed, cookies rotated", body = MessageResponse),
        (status = 401, description = "Missing, invalid or orphaned refresh token", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Session"
)]
pub async fn refresh(State(state): State<AppState>, jar: CookieJar) -> Result<Response, AppError> {
    let token = match jar.get(REFRESH_TOKEN_COOKIE) {
        Some(cookie) => cookie.value().to_string(),
        None => {
            return Err(AppError::Unauthorized(anyhow::anyhow!(
                "Missing refresh token"
            )));
        }
    };

    let claims = match state.tokens.verify(&token, TokenKind::Refresh) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::debug!(error = %e, "Refresh token rejected");
            return Ok(session_invalidated(jar));
        }
    };

    match state.sessions.refresh(claims.sub).await {
        Ok(tokens) => {
            let jar = set_auth_cookies(
                jar,
                &tokens,
                state.tokens.access_token_expiry_seconds(),
                state.config.security.secure_cookies,
            );
            Ok((
                StatusCode::OK,
                jar,
                Json(MessageResponse {
                    message: "Tokens refreshed successfully".to_string(),
                }),
            )
                .into_response())
        }
        // Subject no longer exists (deleted account): the session must be
        // invalidated on the client, so the cookies go out cleared.
        Err(ServiceError::UserNotFound) => Ok(session_invalidated(jar)),
        Err(e) => Err(e.into()),
    }
}

/// Logout: mark the user offline and clear both auth cookies
#[utoipa::path(
    delete,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logged out, cookies cleared", body = MessageResponse),
        (status = 401, description = "Missing or invalid access token", body = ErrorResponse)
    ),
    tag = "Session",
    security(("cookie_auth" = []))
)]
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    state.sessions.logout(user.0.sub).await?;

    Ok((
        StatusCode::OK,
        clear_auth_cookies(jar),
        Json(MessageResponse {
            message: "Logged out successfully".to_string(),
        }),
    ))
}

/// Current session snapshot: sanitized user plus the 2FA-verified claim
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Session snapshot", body = MeResponse),
        (status = 401, description = "Missing, invalid or orphaned access token", body = ErrorResponse)
    ),
    tag = "Session",
    security(("cookie_auth" = []))
)]
pub async fn me(State(state): State<AppState>, user: AuthUser) -> Result<impl IntoResponse, AppError> {
    let snapshot = state
        .sessions
        .me(user.0.sub, user.0.two_factor_verified)
        .await?;

    Ok(Json(MeResponse {
        user: snapshot.user,
        two_factor_verified: snapshot.two_factor_verified,
    }))
}

fn session_invalidated(jar: CookieJar) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        clear_auth_cookies(jar),
        Json(ErrorResponse {
            error: "Session is no longer valid".to_string(),
        }),
    )
        .into_response()
}
