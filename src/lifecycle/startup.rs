//! Startup orchestration.
//!
//! # Responsibilities
//! - Bind the listener before anything else can fail silently
//! - Install the metrics exporter when enabled
//! - Run the accept loop until a termination signal arrives

use std::net::SocketAddr;

use crate::config::ProxyConfig;
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::net::{Listener, ListenerError};
use crate::observability::metrics;

/// Fatal startup errors.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// Run the proxy with `config` until SIGINT or SIGTERM.
pub async fn run(config: ProxyConfig) -> Result<(), StartupError> {
    let listener = Listener::bind(&config.listener).await?;

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = HttpServer::new(config);
    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();

    tokio::spawn(async move {
        signals::shutdown_signal().await;
        shutdown.trigger();
    });

    server.run(listener, receiver).await;
    tracing::info!("Shutdown complete");
    Ok(())
}
