use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use axum_extra::extract::cookie::CookieJar;
use service_core::error::AppError;

use crate::{
    dtos::auth::{MessageResponse, TwoFactorCodeRequest, TwoFactorSetupResponse},
    middleware::AuthUser,
    utils::{set_auth_cookies, ValidatedJson},
    AppState,
};

/// Start 2FA enrollment: generate a secret and its provisioning URI
#[utoipa::path(
    get,
    path = "/auth/2fa/generate",
    responses(
        (status = 200, description = "Fresh secret generated", body = TwoFactorSetupResponse),
        (status = 401, description = "Missing or invalid access token", body = ErrorResponse)
    ),
    tag = "Two-Factor",
    security(("cookie_auth" = []))
)]
pub async fn generate(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let enrollment = state.totp.generate_secret(user.0.sub).await?;

    Ok(Json(TwoFactorSetupResponse {
        secret: enrollment.secret,
        otpauth_url: enrollment.otpauth_url,
    }))
}

/// Confirm enrollment with a first valid code and turn 2FA on
#[utoipa::path(
    post,
    path = "/auth/2fa/enable",
    request_body = TwoFactorCodeRequest,
    responses(
        (status = 200, description = "2FA enabled", body = MessageResponse),
        (status = 400, description = "No secret generated yet", body = ErrorResponse),
        (status = 401, description = "Invalid code or token", body = ErrorResponse)
    ),
    tag = "Two-Factor",
    security(("cookie_auth" = []))
)]
pub async fn enable(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<TwoFactorCodeRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.totp.enable(user.0.sub, &req.code).await?;

    Ok(Json(MessageResponse {
        message: "2FA enabled successfully".to_string(),
    }))
}

/// Elevate the current session: validate a code and re-issue verified tokens
#[utoipa::path(
    post,
    path = "/auth/2fa/verify",
    request_body = TwoFactorCodeRequest,
    responses(
        (status = 200, description = "Session elevated, cookies rotated", body = MessageResponse),
        (status = 400, description = "2FA not enabled", body = ErrorResponse),
        (status = 401, description = "Invalid code or token", body = ErrorResponse)
    ),
    tag = "Two-Factor",
    security(("cookie_auth" = []))
)]
pub async fn verify(
    State(state): State<AppState>,
    jar: CookieJar,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<TwoFactorCodeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let tokens = state
        .sessions
        .verify_two_factor(user.0.sub, &req.code)
        .await?;

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
            message: "2FA verification successful".to_string(),
        }),
    ))
}

/// Turn 2FA off; requires a currently valid code
#[utoipa::path(
    post,
    path = "/auth/2fa/disable",
    request_body = TwoFactorCodeRequest,
    responses(
        (status = 200, description = "2FA disabled", body = MessageResponse),
        (status = 400, description = "2FA not enabled", body = ErrorResponse),
        (status = 401, description = "Invalid code or token", body = ErrorResponse)
    ),
    tag = "Two-Factor",
    security(("cookie_auth" = []))
)]
pub async fn disable(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<TwoFactorCodeRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.totp.disable(user.0.sub, &req.code).await?;

    Ok(Json(MessageResponse {
        message: "2FA disabled successfully".to_string(),
    }))
}
