//! User model - account records with 2FA and profile-completion state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Presence status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Online,
    Offline,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Online => "online",
            Status::Offline => "offline",
        }
    }
}

/// User entity.
///
/// `two_factor_secret` is the persisted TOTP seed; whether the *session* has
/// passed a 2FA check lives in the token claims, never here.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub username: Option<String>,
    pub avatar: Option<String>,
    pub status: String,
    pub two_factor_enabled: bool,
    pub two_factor_secret: Option<String>,
    pub profile_complete: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new user with default profile values.
    pub fn new(email: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email,
            password_hash,
            username: None,
            avatar: None,
            status: Status::Online.as_str().to_string(),
            two_factor_enabled: false,
            two_factor_secret: None,
            profile_complete: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Convert to sanitized response (no credential material).
    pub fn sanitized(&self) -> SanitizedUser {
        SanitizedUser::from(self.clone())
    }
}

/// User projection for API responses (without sensitive fields).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SanitizedUser {
    pub id: Uuid,
    pub email: String,
    pub username: Option<String>,
    pub avatar: Option<String>,
    pub status: String,
    pub two_factor_enabled: bool,
    pub profile_complete: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for SanitizedUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            username: u.username,
            avatar: u.avatar,
            status: u.status,
            two_factor_enabled: u.two_factor_enabled,
            profile_complete: u.profile_complete,
            created_at: u.created_at,
        }
    }
}
