mod api;
mod config;
mod orchestrator;
mod presenter;
mod querier;
mod roster;

use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use anyhow::{Context, Result};
use shared::types::RosterSnapshot;
use crate::config::Config;
use crate::orchestrator::{QueryMode, QueryOrchestrator};
use crate::presenter::{ListingFormat, LogPresenter, Presenter, SnapshotPublisher};
use crate::querier::SteamQuerier;

#[tokio::main]
async fn main() -> Result<()> {
    // Load config
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/etc/serverlistd/serverlistd.toml".to_string());

    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path))?;

    // Initialize tracing, RUST_LOG wins over the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new(format!("serverlistd={}", config.logging.level))
                })
        )
        .init();

    tracing::info!("Starting serverlistd");
    tracing::info!("Loaded config from {}", config_path);

    let settings = config.query.settings()?;

    let querier = SteamQuerier::new(
        config.webapi_key().to_string(),
        config.query.request_timeout()?,
        config.query.directory_limit,
    )?;

    let format = Arc::new(ListingFormat {
        config: config.presenter.clone(),
        query_interval: settings.query_interval,
    });

    let info = Arc::new(api::routes::ConfigResponse::new(
        if settings.whitelist.is_some() { QueryMode::Whitelist } else { QueryMode::Discovery },
        settings.game_dir.clone(),
        settings.query_interval,
        settings.directory_query_interval,
        settings.max_unresponsive,
    ));

    let orchestrator = QueryOrchestrator::new(Arc::new(querier), settings)?;

    // Snapshot channel feeding the API
    let (snapshot_tx, snapshot_rx) = watch::channel(RosterSnapshot::default());

    let presenters: Vec<Box<dyn Presenter>> = vec![
        Box::new(LogPresenter::new(format.as_ref().clone())),
        Box::new(SnapshotPublisher::new(snapshot_tx)),
    ];

    // Create cancellation token for graceful shutdown
    let cancel = CancellationToken::new();

    // Spawn query orchestrator task
    let orch_cancel = cancel.clone();
    let tick = config.query.tick_interval()?;
    let orch_handle = tokio::spawn(async move {
        if let Err(e) = orchestrator::run(orchestrator, presenters, tick, orch_cancel).await {
            tracing::error!("Query orchestrator error: {}", e);
        }
    });

    // Build API router
    let app_state = api::routes::AppState {
        snapshot_rx,
        format,
        info,
    };
    let app = api::routes::router(app_state);

    // Bind HTTP server
    let listener = tokio::net::TcpListener::bind(&config.api.listen)
        .await
        .with_context(|| format!("Failed to bind to {}", config.api.listen))?;

    tracing::info!("API listening on {}", config.api.listen);

    // Run server with graceful shutdown
    let server_cancel = cancel.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_cancel.cancelled().await })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutdown signal received");

    // Trigger cancellation
    cancel.cancel();

    // Wait for all tasks to complete
    let (orch_result, server_result) = tokio::join!(orch_handle, server_handle);
    for (task, result) in [("Query orchestrator", orch_result), ("API server", server_result)] {
        if let Err(e) = result {
            tracing::error!("{} task failed: {}", task, e);
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
