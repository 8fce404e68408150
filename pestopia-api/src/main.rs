//! pestopia-api - Pest classification and advisory service
//!
//! **Endpoints:**
//! - `POST /predict`: image upload → top-3 pest predictions
//! - `POST /recommend`: pest name → structured management guidance
//! - `GET /health`: collaborator status

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pestopia_api::config::{resolve_llm_api_key, CliArgs};
use pestopia_api::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments (environment fallbacks handled by clap)
    let args = CliArgs::parse();

    let toml_config = pestopia_common::config::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;
    let config = args.apply(toml_config);

    // Initialize tracing; RUST_LOG wins over the configured level
    let level = &config.logging.level;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("pestopia_api={level},pestopia_common={level},tower_http={level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting pestopia-api");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Model: {} (device {})", config.model.location, config.model.device);
    info!("Pesticide data: {}", config.pesticide_data_path.display());

    let llm_api_key = resolve_llm_api_key(&config);
    let state = AppState::bootstrap(&config, llm_api_key)
        .await
        .context("Failed to initialize services")?;
    info!(classifier = ?state.classifier.state(), "Services initialized");

    let app = pestopia_api::build_router(state)
        .layer(pestopia_api::cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
