use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use auditrail_core::{Context, Recorder};
use auditrail_server::{build_storage, create_router, load_config, AppState};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "auditrail-server", version, about = "Audit event ingestion and query service")]
struct Cli {
    /// Path to the TOML config file (default: auditrail.toml)
    #[arg(long, env = "AUDITRAIL_CONFIG")]
    config: Option<PathBuf>,

    /// Override the bind address from the config file
    #[arg(long, env = "AUDITRAIL_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref()).context("failed to load config")?;
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }

    let startup = Context::with_timeout(config.server.request_timeout());
    let storage = build_storage(&config.storage, &startup)
        .await
        .with_context(|| format!("failed to initialise {} storage", config.storage.backend_name()))?;

    let state = AppState::new(Recorder::new(storage), config.server.request_timeout());
    let app = create_router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind))?;
    tracing::info!(
        addr = %config.server.bind,
        backend = config.storage.backend_name(),
        "auditrail-server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("auditrail-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
