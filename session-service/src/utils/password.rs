use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Newtype for a plaintext password to prevent accidental logging
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(password: String) -> Self {
        Self(password)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Newtype for a password hash
#[derive(Debug, Clone)]
pub struct PasswordHashString(String);

impl PasswordHashString {
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Password capability the session coordinator depends on. The core never
/// sees hashing parameters, only this seam.
pub trait PasswordScheme: Send + Sync {
    fn hash(&self, password: &Password) -> Result<PasswordHashString, anyhow::Error>;

    fn verify(&self, password: &Password, hash: &PasswordHashString) -> bool;
}

/// Argon2id implementation with the library's secure defaults. Salt is
/// generated per hash and embedded in the PHC string.
#[derive(Debug, Clone, Default)]
pub struct Argon2Scheme;

impl PasswordScheme for Argon2Scheme {
    fn hash(&self, password: &Password) -> Result<PasswordHashString, anyhow::Error> {
        let argon2 = Argon2::default();
        let salt = SaltString::generate(&mut OsRng);

        let password_hash = argon2
            .hash_password(password.as_str().as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
            .to_string();

        Ok(PasswordHashString::new(password_hash))
    }

    fn verify(&self, password: &Password, hash: &PasswordHashString) -> bool {
        let parsed_hash = match PasswordHash::new(hash.as_str()) {
            Ok(h) => h,
            Err(e) => {
                tracing::warn!(error = %e, "Stored password hash is not a valid PHC string");
                return false;
            }
        };

        Argon2::default()
            .verify_password(password.as_str().as_bytes(), &parsed_hash)
            .is_ok()
    }
}
