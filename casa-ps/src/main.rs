//! casa-ps - Property prediction service
//!
//! Serves price estimates, market segments and spatial clusters for Madrid
//! property listings over HTTP.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use casa_common::config::{load_toml_config, resolve_data_folder, DATA_FOLDER_ENV};
use casa_ps::config::ServiceConfig;
use casa_ps::models::{ArtifactName, ArtifactStore};
use casa_ps::schema::SchemaRegistry;
use casa_ps::{build_router, AppState};

/// Command-line arguments for casa-ps
#[derive(Parser, Debug)]
#[command(name = "casa-ps")]
#[command(about = "Property prediction service")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8000", env = "CASA_PORT")]
    port: u16,

    /// Address to bind
    #[arg(long, default_value = "127.0.0.1", env = "CASA_HOST")]
    host: String,

    /// Folder holding the reference dataset and models/
    #[arg(short, long)]
    data_folder: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is read before tracing so its log level can seed the filter
    let toml_config = load_toml_config(args.config.as_deref())
        .context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| toml_config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting casa-ps v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let data_folder = resolve_data_folder(args.data_folder.as_deref(), DATA_FOLDER_ENV, &toml_config);
    let config = ServiceConfig::new(data_folder, args.host, args.port, &toml_config);
    info!("Data folder: {}", config.data_folder.display());

    let registry = match SchemaRegistry::load(&config.dataset_path()) {
        Ok(registry) => registry,
        Err(e) => {
            error!("Cannot start without reference data: {}", e);
            return Err(anyhow::anyhow!("{}", e));
        }
    };

    let store = ArtifactStore::new(config.models_dir());
    for name in ArtifactName::ALL {
        if !store.exists(name) {
            info!("Artifact {} not present; dependent endpoints will fall back or fail", name);
        }
    }

    let state = AppState::new(registry, store, config.limits);
    let app = build_router(state);

    let addr = config.bind_addr();
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

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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
