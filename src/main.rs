use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use github_maintenance_exporter::config::Config;
use github_maintenance_exporter::directory::{CachedDirectory, SiteinfoClient, run_refresh_loop};
use github_maintenance_exporter::maintenance::MaintenanceState;
use github_maintenance_exporter::metrics::Metrics;
use github_maintenance_exporter::server::{AppState, build_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,github_maintenance_exporter=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("invalid configuration")?;
    tracing::info!(
        project = %config.project,
        state_file = %config.state_file.display(),
        siteinfo = %config.siteinfo_url,
        "Starting GitHub Maintenance Exporter"
    );

    let metrics = Metrics::new().context("failed to register metrics")?;

    let source = SiteinfoClient::new(config.siteinfo_url.clone())
        .context("failed to build siteinfo client")?;
    let directory = Arc::new(CachedDirectory::new());
    directory
        .reload(&source)
        .await
        .context("failed to load siteinfo data")?;

    let state = Arc::new(MaintenanceState::open(
        config.state_file.clone(),
        directory.clone(),
        metrics,
        config.project,
    ));

    let shutdown = CancellationToken::new();
    let refresh = tokio::spawn(run_refresh_loop(
        directory.clone(),
        source,
        state.clone(),
        config.reload,
        shutdown.clone(),
    ));

    let app = build_router(AppState::new(state, directory, config.webhook_secret));

    let listener = tokio::net::TcpListener::bind(config.listen_address)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_address))?;
    tracing::info!("listening on {}", config.listen_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
        .context("server error")?;

    shutdown.cancel();
    refresh.await.context("refresh loop panicked")?;
    tracing::info!("Shut down cleanly");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM, cancelling `shutdown`.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = shutdown.cancelled() => {}
    }
    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}
