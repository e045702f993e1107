//! Proxy server: accept loop and per-connection HTTP/1.1 serving.
//!
//! # Responsibilities
//! - Accept client connections (bounded by the listener's permits)
//! - Spawn one task per connection, inside a `connection` span
//! - Serve exactly one request per connection, with upgrades for CONNECT
//! - Hold the connection slot until any CONNECT tunnel closes
//! - Stop accepting on shutdown and drain in-flight connections and tunnels

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tracing::Instrument;

use crate::cache::ResponseCache;
use crate::config::ProxyConfig;
use crate::http::handler::{log_rejected_request, ProxyHandler, TunnelSlot};
use crate::net::connection::{ConnectionGuard, ConnectionTracker};
use crate::net::listener::{ConnectionPermit, Listener};

/// HTTP server for the caching proxy.
pub struct HttpServer {
    config: ProxyConfig,
    handler: ProxyHandler,
}

impl HttpServer {
    /// Create a new server with an empty cache sized from the configuration.
    pub fn new(config: ProxyConfig) -> Self {
        let capacity = NonZeroUsize::new(config.cache.capacity).unwrap_or(NonZeroUsize::MIN);
        let cache = Arc::new(ResponseCache::new(capacity));
        let handler = ProxyHandler::new(cache, config.timeouts.connect());

        tracing::info!(capacity = capacity.get(), "Response cache created");
        Self { config, handler }
    }

    /// The cache shared by every connection.
    pub fn cache(&self) -> Arc<ResponseCache> {
        Arc::clone(self.handler.cache())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Accept connections until `shutdown` fires, then wait for in-flight
    /// connections up to the configured deadline.
    pub async fn run(self, listener: Listener, mut shutdown: broadcast::Receiver<()>) {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(address = %addr, "Proxy server starting");
        }

        let mut tracker = ConnectionTracker::new();
        let header_read_timeout = self.config.timeouts.header_read();

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer, permit) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            tracing::warn!(error = %e, "Failed to accept connection");
                            continue;
                        }
                    };
                    let guard = tracker.track();
                    let span = tracing::info_span!("connection", id = %guard.id(), peer = %peer);
                    let handler = self.handler.clone();
                    tokio::spawn(
                        serve_connection(handler, stream, header_read_timeout, guard, permit)
                            .instrument(span),
                    );
                }
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting connections");
                    break;
                }
            }
        }

        drop(listener);
        let deadline = self.config.timeouts.shutdown();
        if tokio::time::timeout(deadline, tracker.wait_for_shutdown()).await.is_err() {
            tracing::warn!(
                active = tracker.active_count(),
                "Shutdown deadline reached with connections still open"
            );
        }
        tracing::info!("Proxy server stopped");
    }
}

/// Serve one request on `stream`, then wait for the tunnel it opened, if any.
/// The socket, the tracking guard and the listener permit are all released
/// when this returns.
async fn serve_connection(
    handler: ProxyHandler,
    stream: TcpStream,
    header_read_timeout: Option<Duration>,
    _guard: ConnectionGuard,
    _permit: ConnectionPermit,
) {
    let start = Instant::now();
    let mut builder = http1::Builder::new();
    builder
        .preserve_header_case(true)
        .title_case_headers(true);
    if let Some(timeout) = header_read_timeout {
        builder.timer(TokioTimer::new()).header_read_timeout(timeout);
    }

    let tunnel = TunnelSlot::new();
    let slot = tunnel.clone();
    let service = service_fn(move |request| {
        let (handler, slot) = (handler.clone(), slot.clone());
        async move { handler.handle(request, &slot).await }
    });

    if let Err(e) = builder
        .serve_connection(TokioIo::new(stream), service)
        .with_upgrades()
        .await
    {
        if e.is_parse() || e.is_parse_too_large() {
            log_rejected_request(&e, start);
        } else {
            tracing::debug!(error = %e, "Connection ended with error");
        }
    }

    if let Some(relay) = tunnel.take() {
        if let Err(e) = relay.await {
            tracing::error!(error = %e, "Tunnel task failed");
        }
    }
}
