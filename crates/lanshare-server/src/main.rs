//! # lanshare-directory
//!
//! Directory service binary: serves the peer registry, file permissions and
//! transfer log over HTTP/JSON until interrupted.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use lanshare_server::{serve, AppState, DirectoryService, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,lanshare_server=debug")),
        )
        .init();

    info!("Starting lanshare directory v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    let directory = DirectoryService::open(&config.db_path, config.max_file_size)?;
    let http_addr = config.http_addr;
    let state = AppState {
        directory,
        config: Arc::new(config),
    };

    tokio::select! {
        result = serve(state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
