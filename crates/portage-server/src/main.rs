//! Portage Server - Main entry point

use anyhow::Result;
use axum::{routing::get, Json, Router};
use portage_common::logging::{init_logging, LogConfig};
use portage_connectors::Registry;
use serde_json::json;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tracing::info;

use portage_server::{config::Config, features, middleware};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging with configuration from environment
    let log_config = LogConfig::from_env()
        .unwrap_or_default()
        .with_file_prefix("portage-server")
        .with_filter_directives("portage_server=debug,portage_connectors=debug,tower_http=debug");

    init_logging(&log_config)?;

    info!("Starting Portage Server");

    // Load configuration
    let config = Config::load()?;
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    // Build the application router
    let app = create_router(&config);

    // Create socket address
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Start server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.server.shutdown_timeout_secs))
        .await?;

    info!("Server shut down gracefully");

    Ok(())
}

/// Create the application router with all routes and middleware
fn create_router(config: &Config) -> Router {
    let feature_state = features::FeatureState {
        registry: Arc::new(Registry::new()),
    };

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", features::router(feature_state))
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer(&config.cors))
}

/// Liveness probe. Warehouse connections are per-request, so there is no
/// backing connectivity to check here.
async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

/// Graceful shutdown signal handler
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }

    // Give in-flight transfers a moment to complete
    info!("Waiting up to {} seconds for connections to close", timeout_secs);
    tokio::time::sleep(Duration::from_secs(timeout_secs.min(5))).await;
}
