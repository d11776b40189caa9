use axum::{extract::State, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::auth::CompleteProfileRequest, middleware::AuthUser, utils::ValidatedJson, AppState,
};

/// Complete the profile: pick a username and mark the account ready
#[utoipa::path(
    post,
    path = "/users/complete-profile",
    request_body = CompleteProfileRequest,
    responses(
        (status = 200, description = "Profile completed", body = SanitizedUser),
        (status = 401, description = "Missing or invalid access token", body = ErrorResponse),
        (status = 409, description = "Username already taken", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "User",
    security(("cookie_auth" = []))
)]
pub async fn complete_profile(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<CompleteProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    let updated = state
        .sessions
        .complete_profile(user.0.sub, req.username, req.avatar)
        .await?;

    Ok(Json(updated))
}
