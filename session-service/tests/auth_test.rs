mod common;

use axum::http::StatusCode;
use common::*;
use session_service::services::TokenKind;
use session_service::utils::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use tower::util::ServiceExt;

#[tokio::test]
async fn signup_issues_unverified_session() {
    let app = spawn_app().await;

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/signup",
            serde_json::json!({
                "email": "new_player@example.com",
                "password": "password123"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);

    let access = cookie_value(&response, ACCESS_TOKEN_COOKIE).expect("access cookie missing");
    let refresh = cookie_value(&response, REFRESH_TOKEN_COOKIE).expect("refresh cookie missing");

    let claims = app.state.tokens.verify(&access, TokenKind::Access).unwrap();
    assert!(!claims.two_factor_verified);

    let refresh_claims = app.state.tokens.verify(&refresh, TokenKind::Refresh).unwrap();
    assert_eq!(refresh_claims.sub, claims.sub);
    assert!(!refresh_claims.two_factor_verified);

    let user = app.store.get(claims.sub).await.expect("user not persisted");
    assert_eq!(user.email, "new_player@example.com");
    assert!(!user.profile_complete);
    assert!(!user.two_factor_enabled);
}

#[tokio::test]
async fn signup_duplicate_email_conflicts() {
    let app = spawn_app().await;
    seed_user(&app, "taken@example.com", "password123").await;

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/signup",
            serde_json::json!({
                "email": "taken@example.com",
                "password": "password123"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn signup_rejects_invalid_email() {
    let app = spawn_app().await;

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/signup",
            serde_json::json!({
                "email": "not-an-email",
                "password": "password123"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn login_with_unknown_email_fails() {
    let app = spawn_app().await;

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/login",
            serde_json::json!({
                "email": "ghost@example.com",
                "password": "password123"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Invalid credentials");
}

#[tokio::test]
async fn wrong_password_indistinguishable_from_unknown_email() {
    let app = spawn_app().await;
    seed_user(&app, "player@example.com", "password123").await;

    let wrong_password = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/login",
            serde_json::json!({
                "email": "player@example.com",
                "password": "wrong-password"
            }),
        ))
        .await
        .unwrap();

    let unknown_email = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/login",
            serde_json::json!({
                "email": "ghost@example.com",
                "password": "password123"
            }),
        ))
        .await
        .unwrap();

    // Same status and same body: the response must not leak whether the
    // account exists.
    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);
    let a = response_json(wrong_password).await;
    let b = response_json(unknown_email).await;
    assert_eq!(a, b);
}

#[tokio::test]
async fn login_without_two_factor_is_not_flagged() {
    let app = spawn_app().await;
    let user = seed_user(&app, "player@example.com", "password123").await;

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/login",
            serde_json::json!({
                "email": "player@example.com",
                "password": "password123"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let access = cookie_value(&response, ACCESS_TOKEN_COOKIE).expect("access cookie missing");
    let claims = app.state.tokens.verify(&access, TokenKind::Access).unwrap();
    assert_eq!(claims.sub, user.id);
    assert!(!claims.two_factor_verified);

    let body = response_json(response).await;
    assert_eq!(body["requires_two_factor"], false);

    let stored = app.store.get(user.id).await.unwrap();
    assert_eq!(stored.status, "online");
}

#[tokio::test]
async fn login_with_two_factor_enabled_still_issues_unverified_tokens() {
    let app = spawn_app().await;
    let mut user = seed_user(&app, "player@example.com", "password123").await;
    user.two_factor_enabled = true;
    user.two_factor_secret = Some("JBSWY3DPEHPK3PXP".to_string());
    app.store.insert(user).await;

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/login",
            serde_json::json!({
                "email": "player@example.com",
                "password": "password123"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    // Tokens are minted unverified even when 2FA is on; only the explicit
    // verify step elevates the session.
    let access = cookie_value(&response, ACCESS_TOKEN_COOKIE).unwrap();
    let claims = app.state.tokens.verify(&access, TokenKind::Access).unwrap();
    assert!(!claims.two_factor_verified);

    let body = response_json(response).await;
    assert_eq!(body["requires_two_factor"], true);
}

#[tokio::test]
async fn logout_clears_cookies_and_marks_offline() {
    let app = spawn_app().await;
    let user = seed_user(&app, "player@example.com", "password123").await;

    let tokens = app.state.tokens.issue(user.id, false).unwrap();
    let cookies = format!("access_token={}", tokens.access_token);

    let response = app
        .router
        .clone()
        .oneshot(request_with_cookies("DELETE", "/auth/logout", &cookies))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    // Both cookies come back emptied.
    let cleared = set_cookies(&response);
    assert!(cleared
        .iter()
        .any(|(name, value)| name == "access_token" && value.is_empty()));
    assert!(cleared
        .iter()
        .any(|(name, value)| name == "refresh_token" && value.is_empty()));

    let stored = app.store.get(user.id).await.unwrap();
    assert_eq!(stored.status, "offline");
}

#[tokio::test]
async fn me_reflects_claims_and_record() {
    let app = spawn_app().await;
    let user = seed_user(&app, "player@example.com", "password123").await;

    let tokens = app.state.tokens.issue(user.id, false).unwrap();
    let cookies = format!("access_token={}", tokens.access_token);

    let response = app
        .router
        .clone()
        .oneshot(request_with_cookies("GET", "/auth/me", &cookies))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["two_factor_verified"], false);
    assert_eq!(body["user"]["email"], "player@example.com");
    assert_eq!(body["user"]["profile_complete"], false);
    assert!(body["user"].get("password_hash").is_none());
    assert!(body["user"].get("two_factor_secret").is_none());
}

#[tokio::test]
async fn me_without_token_is_unauthorized() {
    let app = spawn_app().await;

    let response = app
        .router
        .clone()
        .oneshot(request_with_cookies("GET", "/auth/me", ""))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
