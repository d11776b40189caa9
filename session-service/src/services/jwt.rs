use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::JwtConfig;
use service_core::error::AppError;

/// The two token kinds. Each is signed with its own secret, so a token of
/// one kind can never pass verification as the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claims carried by both token kinds.
///
/// `two_factor_verified` is session state: it exists only inside signed
/// tokens and is never written back to the user record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (user ID)
    pub sub: Uuid,
    /// Whether this session has passed a 2FA check
    pub two_factor_verified: bool,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// JWT ID
    pub jti: String,
}

/// Token verification/signing failures.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("token signature mismatch")]
    InvalidSignature,

    #[error("malformed token")]
    Malformed,

    #[error("token signing failed: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

/// An access/refresh pair minted together. Both tokens always carry the same
/// `two_factor_verified` value at issuance.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub refresh_ttl_seconds: i64,
}

/// Stateless wrapper over the two signing secrets, loaded once at startup.
#[derive(Clone)]
pub struct TokenService {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_expiry_minutes: i64,
    refresh_expiry_days: i64,
}

impl TokenService {
    pub fn new(config: &JwtConfig) -> Result<Self, AppError> {
        let access_secret = config.access_secret.expose_secret();
        let refresh_secret = config.refresh_secret.expose_secret();

        if access_secret.is_empty() || refresh_secret.is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "session token signing secrets must be set before serving auth traffic"
            )));
        }
        if access_secret == refresh_secret {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "access and refresh token secrets must be distinct"
            )));
        }

        tracing::info!("Token service initialized with HS256 per-kind secrets");

        Ok(Self {
            access_encoding: EncodingKey::from_secret(access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(refresh_secret.as_bytes()),
            access_expiry_minutes: config.access_token_expiry_minutes,
            refresh_expiry_days: config.refresh_token_expiry_days,
        })
    }

    /// Mint a fresh access/refresh pair for a subject.
    pub fn issue(&self, subject: Uuid, two_factor_verified: bool) -> Result<TokenPair, TokenError> {
        let now = Utc::now();

        let access_token = self.sign(
            subject,
            two_factor_verified,
            now,
            Duration::minutes(self.access_expiry_minutes),
            TokenKind::Access,
        )?;
        let refresh_token = self.sign(
            subject,
            two_factor_verified,
            now,
            Duration::days(self.refresh_expiry_days),
            TokenKind::Refresh,
        )?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            refresh_ttl_seconds: self.refresh_expiry_days * 24 * 60 * 60,
        })
    }

    /// Verify a token of the given kind and return its claims. No side effects.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<SessionClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        decode::<SessionClaims>(token, self.decoding_key(kind), &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::Malformed,
            })
    }

    pub fn access_token_expiry_seconds(&self) -> i64 {
        self.access_expiry_minutes * 60
    }

    fn sign(
        &self,
        subject: Uuid,
        two_factor_verified: bool,
        now: chrono::DateTime<Utc>,
        ttl: Duration,
        kind: TokenKind,
    ) -> Result<String, TokenError> {
        let claims = SessionClaims {
            sub: subject,
            two_factor_verified,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, self.encoding_key(kind))
            .map_err(TokenError::Signing)
    }

    fn encoding_key(&self, kind: TokenKind) -> &EncodingKey {
        match kind {
            TokenKind::Access => &self.access_encoding,
            TokenKind::Refresh => &self.refresh_encoding,
        }
    }

    fn decoding_key(&self, kind: TokenKind) -> &DecodingKey {
        match kind {
            TokenKind::Access => &self.access_decoding,
            TokenKind::Refresh => &self.refresh_decoding,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;

    fn test_config() -> JwtConfig {
        JwtConfig {
            access_secret: Secret::new("test-access-secret".to_string()),
            refresh_secret: Secret::new("test-refresh-secret".to_string()),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        }
    }

    #[test]
    fn issue_and_verify_round_trip() {
        let service = TokenService::new(&test_config()).unwrap();
        let subject = Uuid::new_v4();

        let pair = service.issue(subject, true).unwrap();
        assert_eq!(pair.refresh_ttl_seconds, 7 * 24 * 60 * 60);

        let access = service.verify(&pair.access_token, TokenKind::Access).unwrap();
        assert_eq!(access.sub, subject);
        assert!(access.two_factor_verified);

        let refresh = service
            .verify(&pair.refresh_token, TokenKind::Refresh)
            .unwrap();
        assert_eq!(refresh.sub, subject);
        assert!(refresh.two_factor_verified);
    }

    #[test]
    fn pair_carries_same_two_factor_flag() {
        let service = TokenService::new(&test_config()).unwrap();
        let pair = service.issue(Uuid::new_v4(), false).unwrap();

        let access = service.verify(&pair.access_token, TokenKind::Access).unwrap();
        let refresh = service
            .verify(&pair.refresh_token, TokenKind::Refresh)
            .unwrap();
        assert_eq!(access.two_factor_verified, refresh.two_factor_verified);
    }

    #[test]
    fn kind_isolation() {
        let service = TokenService::new(&test_config()).unwrap();
        let pair = service.issue(Uuid::new_v4(), false).unwrap();

        let err = service
            .verify(&pair.access_token, TokenKind::Refresh)
            .unwrap_err();
        assert!(matches!(err, TokenError::InvalidSignature));

        let err = service
            .verify(&pair.refresh_token, TokenKind::Access)
            .unwrap_err();
        assert!(matches!(err, TokenError::InvalidSignature));
    }

    #[test]
    fn expired_token_rejected() {
        let service = TokenService::new(&test_config()).unwrap();
        let now = Utc::now();

        let claims = SessionClaims {
            sub: Uuid::new_v4(),
            two_factor_verified: false,
            iat: (now - Duration::minutes(30)).timestamp(),
            exp: (now - Duration::minutes(15)).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-access-secret"),
        )
        .unwrap();

        let err = service.verify(&token, TokenKind::Access).unwrap_err();
        assert!(matches!(err, TokenError::Expired));
    }

    #[test]
    fn garbage_token_is_malformed() {
        let service = TokenService::new(&test_config()).unwrap();
        let err = service
            .verify("not-a-token", TokenKind::Access)
            .unwrap_err();
        assert!(matches!(err, TokenError::Malformed));
    }

    #[test]
    fn identical_secrets_rejected() {
        let config = JwtConfig {
            access_secret: Secret::new("same".to_string()),
            refresh_secret: Secret::new("same".to_string()),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        };
        assert!(TokenService::new(&config).is_err());
    }
}
