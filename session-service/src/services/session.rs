//! Session coordinator: orchestrates login, signup, refresh, logout and the
//! 2FA elevation step over the token, TOTP, store and password collaborators.

use std::sync::Arc;

use uuid::Uuid;

use crate::models::{SanitizedUser, Status, User};
use crate::services::jwt::{TokenPair, TokenService};
use crate::services::totp::TotpService;
use crate::services::ServiceError;
use crate::store::{ProfileUpdate, StoreError, UserStore};
use crate::utils::password::{Password, PasswordScheme};

/// Result of a password login. Tokens are always issued with
/// `two_factor_verified = false`; when `requires_two_factor` is set the
/// client must elevate the session through `verify_two_factor`.
#[derive(Debug)]
pub struct LoginOutcome {
    pub tokens: TokenPair,
    pub requires_two_factor: bool,
}

/// Per-request session snapshot: current user record plus the 2FA flag from
/// the validated access token. Derived fresh each time, never persisted.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub user: SanitizedUser,
    pub two_factor_verified: bool,
}

#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn UserStore>,
    tokens: TokenService,
    totp: TotpService,
    passwords: Arc<dyn PasswordScheme>,
}

impl SessionService {
    pub fn new(
        store: Arc<dyn UserStore>,
        tokens: TokenService,
        totp: TotpService,
        passwords: Arc<dyn PasswordScheme>,
    ) -> Self {
        Self {
            store,
            tokens,
            totp,
            passwords,
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, ServiceError> {
        let user = self
            .store
            .find_by_email(email)
            .await?
            .ok_or(ServiceError::InvalidCredentials)?;

        let supplied = Password::new(password.to_string());
        let stored = crate::utils::password::PasswordHashString::new(user.password_hash.clone());
        if !self.passwords.verify(&supplied, &stored) {
            return Err(ServiceError::InvalidCredentials);
        }

        self.store.update_status(user.id, Status::Online).await?;

        // Sessions always start unverified; verify_two_factor is the only
        // elevation path. The flag tells the client whether that step is due.
        let tokens = self.tokens.issue(user.id, false)?;

        tracing::info!(user_id = %user.id, "User logged in");

        Ok(LoginOutcome {
            tokens,
            requires_two_factor: user.two_factor_enabled,
        })
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<TokenPair, ServiceError> {
        if self.store.find_by_email(email).await?.is_some() {
            return Err(ServiceError::EmailAlreadyRegistered);
        }

        let password_hash = self
            .passwords
            .hash(&Password::new(password.to_string()))
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Password hashing error: {}", e)))?;

        let user = User::new(email.to_string(), password_hash.into_string());
        let user_id = user.id;

        match self.store.create(&user).await {
            Ok(()) => {}
            // Lost a race with a concurrent signup for the same email.
            Err(StoreError::Duplicate) => return Err(ServiceError::EmailAlreadyRegistered),
            Err(e) => return Err(e.into()),
        }

        tracing::info!(user_id = %user_id, "User registered");

        Ok(self.tokens.issue(user_id, false)?)
    }

    /// Re-issue both tokens for an existing subject. The user's current
    /// 2FA-enabled flag becomes the new `two_factor_verified` value, so a
    /// refreshed session keeps the standing it had.
    pub async fn refresh(&self, subject: Uuid) -> Result<TokenPair, ServiceError> {
        let user = self
            .store
            .find_by_id(subject)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        Ok(self.tokens.issue(user.id, user.two_factor_enabled)?)
    }

    pub async fn logout(&self, subject: Uuid) -> Result<(), ServiceError> {
        if self.store.find_by_id(subject).await?.is_some() {
            self.store.update_status(subject, Status::Offline).await?;
        }
        tracing::info!(user_id = %subject, "User logged out");
        Ok(())
    }

    /// Elevate a session after login: validate the TOTP code and mint a
    /// verified token pair.
    pub async fn verify_two_factor(
        &self,
        subject: Uuid,
        code: &str,
    ) -> Result<TokenPair, ServiceError> {
        self.totp.verify(subject, code).await?;
        Ok(self.tokens.issue(subject, true)?)
    }

    pub async fn me(
        &self,
        subject: Uuid,
        two_factor_verified: bool,
    ) -> Result<SessionSnapshot, ServiceError> {
        let user = self
            .store
            .find_by_id(subject)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        Ok(SessionSnapshot {
            user: user.sanitized(),
            two_factor_verified,
        })
    }

    pub async fn complete_profile(
        &self,
        subject: Uuid,
        username: String,
        avatar: Option<String>,
    ) -> Result<SanitizedUser, ServiceError> {
        if let Some(existing) = self.store.find_by_username(&username).await? {
            if existing.id != subject {
                return Err(ServiceError::UsernameTaken);
            }
        }

        self.store
            .update_profile(
                subject,
                ProfileUpdate {
                    username: Some(username),
                    avatar,
                },
            )
            .await
            .map_err(|e| match e {
                StoreError::Duplicate => ServiceError::UsernameTaken,
                StoreError::NotFound => ServiceError::UserNotFound,
                other => other.into(),
            })?;
        self.store.mark_profile_complete(subject).await?;

        let user = self
            .store
            .find_by_id(subject)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        tracing::info!(user_id = %subject, "Profile completed");

        Ok(user.sanitized())
    }
}
