mod common;

use axum::http::StatusCode;
use common::*;
use session_service::services::TokenKind;
use session_service::utils::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use tower::util::ServiceExt;

#[tokio::test]
async fn refresh_rotates_both_tokens() {
    let app = spawn_app().await;
    let user = seed_user(&app, "player@example.com", "password123").await;

    let tokens = app.state.tokens.issue(user.id, false).unwrap();
    let cookies = format!("refresh_token={}", tokens.refresh_token);

    let response = app
        .router
        .clone()
        .oneshot(request_with_cookies("POST", "/auth/refresh", &cookies))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let access = cookie_value(&response, ACCESS_TOKEN_COOKIE).expect("access cookie missing");
    let refresh = cookie_value(&response, REFRESH_TOKEN_COOKIE).expect("refresh cookie missing");

    let access_claims = app.state.tokens.verify(&access, TokenKind::Access).unwrap();
    assert_eq!(access_claims.sub, user.id);

    let refresh_claims = app.state.tokens.verify(&refresh, TokenKind::Refresh).unwrap();
    assert_eq!(refresh_claims.sub, user.id);
}

#[tokio::test]
async fn refresh_carries_current_two_factor_standing() {
    let app = spawn_app().await;
    let mut user = seed_user(&app, "player@example.com", "password123").await;
    user.two_factor_enabled = true;
    user.two_factor_secret = Some("JBSWY3DPEHPK3PXP".to_string());
    app.store.insert(user.clone()).await;

    let tokens = app.state.tokens.issue(user.id, true).unwrap();
    let cookies = format!("refresh_token={}", tokens.refresh_token);

    let response = app
        .router
        .clone()
        .oneshot(request_with_cookies("POST", "/auth/refresh", &cookies))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let access = cookie_value(&response, ACCESS_TOKEN_COOKIE).unwrap();
    let claims = app.state.tokens.verify(&access, TokenKind::Access).unwrap();
    assert!(claims.two_factor_verified);
}

#[tokio::test]
async fn refresh_without_cookie_is_unauthorized() {
    let app = spawn_app().await;

    let response = app
        .router
        .clone()
        .oneshot(request_with_cookies("POST", "/auth/refresh", ""))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn access_token_never_passes_as_refresh_token() {
    let app = spawn_app().await;
    let user = seed_user(&app, "player@example.com", "password123").await;

    let tokens = app.state.tokens.issue(user.id, false).unwrap();
    // Present the access token in the refresh slot: kind isolation must
    // reject it even though it is a perfectly valid token of the other kind.
    let cookies = format!("refresh_token={}", tokens.access_token);

    let response = app
        .router
        .clone()
        .oneshot(request_with_cookies("POST", "/auth/refresh", &cookies))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_for_deleted_user_invalidates_session() {
    let app = spawn_app().await;
    let user = seed_user(&app, "player@example.com", "password123").await;

    let tokens = app.state.tokens.issue(user.id, false).unwrap();
    app.store.remove(user.id).await;

    let cookies = format!("refresh_token={}", tokens.refresh_token);
    let response = app
        .router
        .clone()
        .oneshot(request_with_cookies("POST", "/auth/refresh", &cookies))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // The 401 must also tear down the client's cookies.
    let cleared = set_cookies(&response);
    assert!(cleared
        .iter()
        .any(|(name, value)| name == "access_token" && value.is_empty()));
    assert!(cleared
        .iter()
        .any(|(name, value)| name == "refresh_token" && value.is_empty()));
}
