//! UserStore capability: the persistence seam the session core depends on.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Status, User};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("duplicate record")]
    Duplicate,

    #[error("record not found")]
    NotFound,
}

/// Partial profile update applied during profile completion.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub avatar: Option<String>,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn health_check(&self) -> Result<(), StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn create(&self, user: &User) -> Result<(), StoreError>;

    async fn update_status(&self, id: Uuid, status: Status) -> Result<(), StoreError>;

    /// Store a freshly generated TOTP secret. Any previous secret is
    /// overwritten and the enabled flag is reset in the same update, so the
    /// record can never hold an enabled flag pointing at a stale secret.
    async fn set_two_factor_secret(&self, id: Uuid, secret: &str) -> Result<(), StoreError>;

    /// Flip the 2FA flag on. Only succeeds when a secret is present.
    async fn enable_two_factor(&self, id: Uuid) -> Result<(), StoreError>;

    /// Clear the secret and the flag together, as one update.
    async fn disable_two_factor(&self, id: Uuid) -> Result<(), StoreError>;

    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> Result<(), StoreError>;

    async fn mark_profile_complete(&self, id: Uuid) -> Result<(), StoreError>;
}
