//! TOTP enrollment and verification.
//!
//! Codes use the standard 30-second time step with a skew tolerance of one
//! step either side. There is no replay cache; reuse inside one window is
//! bounded by the window itself.

use std::sync::Arc;

use totp_rs::{Algorithm, Secret, TOTP};
use uuid::Uuid;

use crate::config::TotpConfig;
use crate::models::User;
use crate::services::ServiceError;
use crate::store::UserStore;

const TOTP_DIGITS: usize = 6;
const TOTP_SKEW: u8 = 1;
const TOTP_STEP_SECONDS: u64 = 30;

/// Secret plus provisioning URI handed back at enrollment start. The URI is
/// the standard `otpauth://totp/...` form, rendered as a QR code by the
/// caller.
#[derive(Debug, Clone)]
pub struct TotpEnrollment {
    pub secret: String,
    pub otpauth_url: String,
}

#[derive(Clone)]
pub struct TotpService {
    store: Arc<dyn UserStore>,
    issuer: String,
}

impl TotpService {
    pub fn new(config: &TotpConfig, store: Arc<dyn UserStore>) -> Self {
        Self {
            store,
            issuer: config.issuer.clone(),
        }
    }

    /// Begin enrollment: generate a fresh secret, persist it (resetting the
    /// enabled flag), and return it with its provisioning URI. Overwrites any
    /// previous secret.
    pub async fn generate_secret(&self, user_id: Uuid) -> Result<TotpEnrollment, ServiceError> {
        let user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        let secret_bytes = Secret::generate_secret()
            .to_bytes()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("secret generation: {}", e)))?;
        let totp = self.totp_from_bytes(secret_bytes, &user.email)?;

        let secret = totp.get_secret_base32();
        let otpauth_url = totp.get_url();

        self.store.set_two_factor_secret(user_id, &secret).await?;

        tracing::info!(user_id = %user_id, "Generated new 2FA secret");

        Ok(TotpEnrollment { secret, otpauth_url })
    }

    /// Confirm enrollment with a first valid code and turn 2FA on.
    pub async fn enable(&self, user_id: Uuid, code: &str) -> Result<(), ServiceError> {
        let user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        let secret = user
            .two_factor_secret
            .as_deref()
            .ok_or(ServiceError::NotEnrolled)?;

        self.check_code(secret, &user.email, code)?;

        self.store.enable_two_factor(user_id).await?;

        tracing::info!(user_id = %user_id, "2FA enabled");
        Ok(())
    }

    /// Validate a code for an enabled user. No state mutation.
    pub async fn verify(&self, user_id: Uuid, code: &str) -> Result<(), ServiceError> {
        let user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        let secret = self.enabled_secret(&user)?;
        self.check_code(secret, &user.email, code)
    }

    /// Turn 2FA off. Requires a valid code; the secret and the flag are
    /// cleared in a single store update.
    pub async fn disable(&self, user_id: Uuid, code: &str) -> Result<(), ServiceError> {
        let user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        let secret = self.enabled_secret(&user)?;
        self.check_code(secret, &user.email, code)?;

        self.store.disable_two_factor(user_id).await?;

        tracing::info!(user_id = %user_id, "2FA disabled");
        Ok(())
    }

    fn enabled_secret<'a>(&self, user: &'a User) -> Result<&'a str, ServiceError> {
        if !user.two_factor_enabled {
            return Err(ServiceError::NotEnabled);
        }
        user.two_factor_secret
            .as_deref()
            .ok_or(ServiceError::NotEnabled)
    }

    fn check_code(&self, secret: &str, account: &str, code: &str) -> Result<(), ServiceError> {
        let secret_bytes = Secret::Encoded(secret.to_string())
            .to_bytes()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("stored secret invalid: {}", e)))?;
        let totp = self.totp_from_bytes(secret_bytes, account)?;

        let valid = totp
            .check_current(code)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("system time: {}", e)))?;

        if valid {
            Ok(())
        } else {
            Err(ServiceError::InvalidCode)
        }
    }

    fn totp_from_bytes(&self, secret: Vec<u8>, account: &str) -> Result<TOTP, ServiceError> {
        TOTP::new(
            Algorithm::SHA1,
            TOTP_DIGITS,
            TOTP_SKEW,
            TOTP_STEP_SECONDS,
            secret,
            Some(self.issuer.clone()),
            account.to_string(),
        )
        .map_err(|e| ServiceError::Internal(anyhow::anyhow!("TOTP init: {}", e)))
    }
}
