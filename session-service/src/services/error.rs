use service_core::error::AppError;
use thiserror::Error;

use crate::services::jwt::TokenError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email already registered")]
    EmailAlreadyRegistered,

    #[error("Username already taken")]
    UsernameTaken,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("Two-factor secret not generated")]
    NotEnrolled,

    #[error("Two-factor authentication is not enabled")]
    NotEnabled,

    #[error("Invalid two-factor code")]
    InvalidCode,

    #[error("User not found")]
    UserNotFound,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            // Unknown email and password mismatch surface identically so the
            // response never reveals whether an account exists.
            ServiceError::InvalidCredentials => {
                AppError::Unauthorized(anyhow::anyhow!("Invalid credentials"))
            }
            ServiceError::EmailAlreadyRegistered => {
                AppError::Conflict(anyhow::anyhow!("Email already registered"))
            }
            ServiceError::UsernameTaken => {
                AppError::Conflict(anyhow::anyhow!("Username already taken"))
            }
            ServiceError::Token(TokenError::Signing(e)) => {
                AppError::InternalError(anyhow::anyhow!("token signing failed: {}", e))
            }
            ServiceError::Token(_) => {
                AppError::Unauthorized(anyhow::anyhow!("Invalid or expired token"))
            }
            ServiceError::NotEnrolled => {
                AppError::BadRequest(anyhow::anyhow!("Two-factor secret not generated"))
            }
            ServiceError::NotEnabled => {
                AppError::BadRequest(anyhow::anyhow!("Two-factor authentication is not enabled"))
            }
            ServiceError::InvalidCode => {
                AppError::Unauthorized(anyhow::anyhow!("Invalid two-factor code"))
            }
            ServiceError::UserNotFound => {
                AppError::Unauthorized(anyhow::anyhow!("Session is no longer valid"))
            }
            ServiceError::Store(e) => AppError::DatabaseError(anyhow::Error::new(e)),
            ServiceError::Internal(e) => AppError::InternalError(e),
        }
    }
}
