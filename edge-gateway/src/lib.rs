pub mod config;
pub mod handlers;
pub mod middleware;
pub mod policy;
pub mod services;
pub mod utils;

use std::sync::Arc;

use axum::{middleware::from_fn_with_state, routing::get, Json, Router};
use tower_http::trace::TraceLayer;

use crate::services::{AuthClient, RefreshRegistry, RefreshedSession};

#[derive(Clone)]
pub struct GatewayState {
    pub config: config::Settings,
    pub auth: AuthClient,
    pub refreshes: Arc<RefreshRegistry<RefreshedSession>>,
    pub http: reqwest::Client,
}

impl GatewayState {
    pub fn new(config: config::Settings) -> Self {
        let auth = AuthClient::new(&config.session_service);
        Self {
            config,
            auth,
            refreshes: Arc::new(RefreshRegistry::new()),
            http: reqwest::Client::new(),
        }
    }
}

pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .fallback(handlers::proxy::proxy)
        .layer(from_fn_with_state(state.clone(), middleware::route_guard))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "edge-gateway",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
