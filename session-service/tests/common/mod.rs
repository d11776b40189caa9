//! Test helper module for session-service integration tests.
//!
//! Builds the real router against the in-memory user store, so tests drive
//! the full HTTP surface without external services.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use secrecy::Secret;
use session_service::{
    build_router,
    config::{
        DatabaseConfig, Environment, JwtConfig, SecurityConfig, SessionConfig, SwaggerConfig,
        TotpConfig,
    },
    models::User,
    services::{SessionService, TokenService, TotpService},
    store::{memory::InMemoryUserStore, UserStore},
    utils::{Argon2Scheme, Password, PasswordScheme},
    AppState,
};
use totp_rs::{Algorithm, Secret as TotpSecret, TOTP};

pub const TEST_ACCESS_SECRET: &str = "integration-access-secret";
pub const TEST_REFRESH_SECRET: &str = "integration-refresh-secret";
pub const TEST_ISSUER: &str = "arcade";

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryUserStore>,
    pub state: AppState,
}

pub fn test_config() -> SessionConfig {
    SessionConfig {
        common: service_core::config::Config {
            port: 8080,
            otlp_endpoint: None,
        },
        environment: Environment::Dev,
        service_name: "session-service".to_string(),
        service_version: "test".to_string(),
        log_level: "debug".to_string(),
        database: DatabaseConfig {
            url: Secret::new("postgres://unused".to_string()),
        },
        jwt: JwtConfig {
            access_secret: Secret::new(TEST_ACCESS_SECRET.to_string()),
            refresh_secret: Secret::new(TEST_REFRESH_SECRET.to_string()),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        },
        totp: TotpConfig {
            issuer: TEST_ISSUER.to_string(),
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            secure_cookies: false,
        },
        swagger: SwaggerConfig { enabled: false },
    }
}

pub async fn spawn_app() -> TestApp {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .try_init();

    let config = test_config();
    let store = Arc::new(InMemoryUserStore::new());
    let dyn_store: Arc<dyn UserStore> = store.clone();

    let tokens = TokenService::new(&config.jwt).expect("Failed to create token service");
    let totp = TotpService::new(&config.totp, dyn_store.clone());
    let sessions = SessionService::new(
        dyn_store.clone(),
        tokens.clone(),
        totp.clone(),
        Arc::new(Argon2Scheme),
    );

    let state = AppState {
        config,
        store: dyn_store,
        tokens,
        totp,
        sessions,
    };

    let router = build_router(state.clone())
        .await
        .expect("Failed to build router");

    TestApp {
        router,
        store,
        state,
    }
}

/// Seed a user directly into the store with a real Argon2 hash.
pub async fn seed_user(app: &TestApp, email: &str, password: &str) -> User {
    let hash = Argon2Scheme
        .hash(&Password::new(password.to_string()))
        .expect("Failed to hash password");
    let user = User::new(email.to_string(), hash.into_string());
    app.store.insert(user.clone()).await;
    user
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn request_with_cookies(method: &str, uri: &str, cookies: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::COOKIE, cookies)
        .body(Body::empty())
        .unwrap()
}

pub fn json_request_with_cookies(
    method: &str,
    uri: &str,
    cookies: &str,
    body: serde_json::Value,
) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::COOKIE, cookies)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Pull `name=value` pairs out of every Set-Cookie header on a response.
pub fn set_cookies(response: &Response<Body>) -> Vec<(String, String)> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|raw| {
            let pair = raw.split(';').next()?;
            let (name, value) = pair.split_once('=')?;
            Some((name.trim().to_string(), value.to_string()))
        })
        .collect()
}

pub fn cookie_value(response: &Response<Body>, name: &str) -> Option<String> {
    set_cookies(response)
        .into_iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v)
}

pub async fn response_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read response body");
    serde_json::from_slice(&bytes).expect("Response body is not valid JSON")
}

/// Compute the code an authenticator app would currently show for a secret.
pub fn current_totp_code(secret_base32: &str, account: &str) -> String {
    let totp = TOTP::new(
        Algorithm::SHA1,
        6,
        1,
        30,
        TotpSecret::Encoded(secret_base32.to_string())
            .to_bytes()
            .expect("Secret is not valid base32"),
        Some(TEST_ISSUER.to_string()),
        account.to_string(),
    )
    .expect("Failed to build TOTP");
    totp.generate_current().expect("Failed to generate code")
}

/// A six-digit code guaranteed not to match the given valid code.
pub fn wrong_totp_code(valid: &str) -> &'static str {
    if valid == "000000" {
        "000001"
    } else {
        "000000"
    }
}
