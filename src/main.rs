//! Mood recommender service - Entry Point

use anyhow::Context;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mood_recommender::{config::AppConfig, server, RecommendationEngine};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    info!("Starting mood recommender");

    let config = AppConfig::load().unwrap_or_else(|e| {
        warn!("Failed to load config from environment: {e}, using defaults");
        AppConfig::default()
    });

    info!(
        dimensions = config.embedding.dimensions,
        classifier = ?config.emotion.strategy,
        data_dir = %config.storage.data_dir.display(),
        "Configuration loaded"
    );

    let addr = config
        .server
        .socket_addr()
        .context("Invalid server address")?;

    // Opening the database and loading the snapshot block
    let (engine, restored) = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
        let engine = RecommendationEngine::open(config).context("Failed to build engine")?;
        let restored = engine
            .restore()
            .context("Failed to restore index snapshot")?;
        Ok((engine, restored))
    })
    .await
    .context("Startup task panicked")??;
    info!(?restored, "Catalog restored");

    let engine = Arc::new(engine);
    let app = server::create_router(server::AppState::new(Arc::clone(&engine)));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(%addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    match tokio::task::spawn_blocking(move || engine.persist()).await {
        Ok(Ok(report)) => info!(titles = report.titles, profiles = report.profiles, "State saved"),
        Ok(Err(e)) => error!(error = %e, "Failed to persist state on shutdown"),
        Err(e) => error!(error = %e, "Persist task panicked"),
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize the tracing subscriber for logging
fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mood_recommender=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
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
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        () = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
