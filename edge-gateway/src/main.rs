use std::net::SocketAddr;

use edge_gateway::{build_router, config::Settings, GatewayState};
use service_core::observability::logging::init_tracing;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    let settings = Settings::load()?;

    init_tracing(
        "edge-gateway",
        &settings.log_level,
        settings.otlp_endpoint.as_deref(),
    );

    tracing::info!(
        session_service = %settings.session_service.url,
        upstream = %settings.upstream.url,
        "Starting edge gateway"
    );

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .map_err(|e| {
            service_core::error::AppError::ConfigError(anyhow::anyhow!(
                "invalid listen address: {}",
                e
            ))
        })?;

    let state = GatewayState::new(settings);
    let app = build_router(state);

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Gateway shutdown complete");
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
