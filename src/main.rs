use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use url_review_reconciler::config::Config;
use url_review_reconciler::determinator::Determinator;
use url_review_reconciler::governor::{Governor, serve_redrives};
use url_review_reconciler::memory::MemoryCollaborators;
use url_review_reconciler::server::{AppState, build_router};

/// Capacity of the channel between the governor and the redrive worker.
const REDRIVE_CHANNEL_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "url_review_reconciler=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match std::env::var("URL_REVIEW_CONFIG_FILE") {
        Ok(path) => Config::from_file(path)?,
        Err(_) => Config::from_env(),
    };
    let config = Arc::new(config);
    if config.workflow_definition.is_none() {
        tracing::warn!("No review workflow configured; no workflows will be started");
    }

    let ports = MemoryCollaborators::new();
    let determinator = Arc::new(Determinator::new(ports.clone(), Arc::clone(&config)));
    let shutdown = CancellationToken::new();

    let (redrive_tx, redrive_rx) = mpsc::channel(REDRIVE_CHANNEL_CAPACITY);
    let worker = tokio::spawn(serve_redrives(
        Arc::clone(&determinator),
        redrive_rx,
        shutdown.clone(),
    ));

    let governor = Governor::new(
        ports.queue.clone(),
        ports.metrics.clone(),
        redrive_tx,
        Arc::clone(&config),
    );
    let poller = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { governor.run(shutdown).await })
    };

    let app = build_router(AppState::new(determinator));
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!("listening on {}", config.listen_addr);

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            }
            tracing::info!("Shutting down");
            server_shutdown.cancel();
        })
        .await?;

    shutdown.cancel();
    poller.await?;
    worker.await?;
    Ok(())
}
