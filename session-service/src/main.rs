use std::net::SocketAddr;
use std::sync::Arc;

use secrecy::ExposeSecret;
use service_core::observability::logging::init_tracing;
use tokio::signal;

use session_service::{
    build_router,
    config::SessionConfig,
    services::{SessionService, TokenService, TotpService},
    store::{postgres::PgUserStore, UserStore},
    utils::Argon2Scheme,
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    // Load configuration - fail fast if invalid. A missing signing secret
    // must never reach the serving path.
    let config = SessionConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.common.otlp_endpoint.as_deref(),
    );

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting session service"
    );

    let pg = PgUserStore::connect(config.database.url.expose_secret())
        .await
        .map_err(|e| service_core::error::AppError::DatabaseError(anyhow::Error::new(e)))?;
    pg.run_migrations()
        .await
        .map_err(|e| service_core::error::AppError::DatabaseError(anyhow::Error::new(e)))?;
    tracing::info!("Database initialized successfully");

    let store: Arc<dyn UserStore> = Arc::new(pg);

    let tokens = TokenService::new(&config.jwt)?;
    let totp = TotpService::new(&config.totp, store.clone());
    let passwords = Arc::new(Argon2Scheme);
    let sessions = SessionService::new(store.clone(), tokens.clone(), totp.clone(), passwords);

    let state = AppState {
        config: config.clone(),
        store,
        tokens,
        totp,
        sessions,
    };

    let app = build_router(state).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
