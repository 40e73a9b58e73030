//! Broadside Game Server
//!
//! Coordinates two-player Broadside matches over WebSocket.
//! Configuration comes from environment variables; see [`ServerConfig::from_env`].

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use broadside::{GameServer, ServerConfig, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let config = ServerConfig::from_env().context("Failed to load configuration")?;

    info!("Broadside Server v{}", VERSION);
    info!(
        "Max connections: {}, idle session timeout: {:?}",
        config.max_connections, config.session_idle_timeout
    );

    let server = Arc::new(GameServer::new(config));

    let mut server_handle = {
        let server = Arc::clone(&server);
        tokio::spawn(async move { server.run().await })
    };

    // Handle shutdown gracefully
    tokio::select! {
        result = &mut server_handle => {
            result.context("Server task panicked")??;
        }
        _ = shutdown_signal() => {
            info!("Shutting down");
            server.shutdown();
            server_handle.await.context("Server task panicked")??;
        }
    }

    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
