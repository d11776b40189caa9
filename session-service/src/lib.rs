pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::security_headers::security_headers_middleware;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::SessionConfig;
use crate::services::{SessionService, TokenService, TotpService};
use crate::store::UserStore;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::session::sign_up,
        handlers::session::login,
        handlers::session::refresh,
        handlers::session::logout,
        handlers::session::me,
        handlers::two_factor::generate,
        handlers::two_factor::enable,
        handlers::two_factor::verify,
        handlers::two_factor::disable,
        handlers::user::complete_profile,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::auth::SignUpRequest,
            dtos::auth::LoginRequest,
            dtos::auth::LoginResponse,
            dtos::auth::MessageResponse,
            dtos::auth::TwoFactorCodeRequest,
            dtos::auth::TwoFactorSetupResponse,
            dtos::auth::MeResponse,
            dtos::auth::CompleteProfileRequest,
            models::SanitizedUser,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Session", description = "Login, signup, refresh and logout"),
        (name = "Two-Factor", description = "TOTP enrollment and verification"),
        (name = "User", description = "Profile completion"),
        (name = "Observability", description = "Service health"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "cookie_auth",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(
                    utils::ACCESS_TOKEN_COOKIE,
                ))),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: SessionConfig,
    pub store: Arc<dyn UserStore>,
    pub tokens: TokenService,
    pub totp: TotpService,
    pub sessions: SessionService,
}

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    // Routes behind a valid access token
    let protected_routes = Router::new()
        .route("/auth/logout", delete(handlers::session::logout))
        .route("/auth/me", get(handlers::session::me))
        .route("/auth/2fa/generate", get(handlers::two_factor::generate))
        .route("/auth/2fa/enable", post(handlers::two_factor::enable))
        .route("/auth/2fa/verify", post(handlers::two_factor::verify))
        .route("/auth/2fa/disable", post(handlers::two_factor::disable))
        .route(
            "/users/complete-profile",
            post(handlers::user::complete_profile),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    let mut app = Router::new().route("/health", get(health_check));

    if state.config.swagger.enabled {
        app = app.merge(SwaggerUi::new("/docs").url("/.well-known/openapi.json", ApiDoc::openapi()));
    }

    let cors_origins: Vec<HeaderValue> = state
        .config
        .security
        .allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e);
                None
            }
        })
        .collect();

    let app = app
        .route("/auth/signup", post(handlers::session::sign_up))
        .route("/auth/login", post(handlers::session::login))
        .route("/auth/refresh", post(handlers::session::refresh))
        .merge(protected_routes)
        .with_state(state.clone())
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            },
        ))
        .layer(from_fn(security_headers_middleware))
        // Credentialed CORS: cookies carry the tokens, so origins must be
        // explicit and wildcards are never sent.
        .layer(
            CorsLayer::new()
                .allow_origin(cors_origins)
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::DELETE,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers([
                    axum::http::header::AUTHORIZATION,
                    axum::http::header::CONTENT_TYPE,
                ])
                .allow_credentials(true),
        );

    Ok(app)
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 500, description = "Service is unhealthy")
    ),
    tag = "Observability"
)]
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.store.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "User store health check failed");
        AppError::DatabaseError(anyhow::Error::new(e))
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "store": "up"
        }
    })))
}
