use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::SanitizedUser;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SignUpRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "player@example.com")]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[schema(example = "password123", min_length = 8)]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "player@example.com")]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    #[schema(example = "password123")]
    pub password: String,
}

/// Tokens travel in cookies; the body only signals whether a 2FA step is due.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    #[schema(example = false)]
    pub requires_two_factor: bool,
    #[schema(example = "Login successful")]
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    #[schema(example = "Tokens refreshed successfully")]
    pub message: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct TwoFactorCodeRequest {
    #[validate(length(equal = 6, message = "Code must be 6 digits"))]
    #[schema(example = "123456")]
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TwoFactorSetupResponse {
    #[schema(example = "JBSWY3DPEHPK3PXP")]
    pub secret: String,
    #[schema(example = "otpauth://totp/arcade:player%40example.com?secret=JBSWY3DPEHPK3PXP&issuer=arcade")]
    pub otpauth_url: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MeResponse {
    pub user: SanitizedUser,
    #[schema(example = false)]
    pub two_factor_verified: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CompleteProfileRequest {
    #[validate(length(min = 3, max = 20, message = "Username must be 3-20 characters"))]
    #[schema(example = "paddle_wizard")]
    pub username: String,

    #[schema(example = "/img/avatars/3.webp")]
    pub avatar: Option<String>,
}
