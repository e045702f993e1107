//! Per-request routing: GET through the cache, POST straight through,
//! CONNECT into a tunnel.
//!
//! # Request States
//! ```text
//! Accepted → ParsingRequest ─┬─ bad request / no Host ─────────→ 400 → Closed
//!                            └─ connect upstream ─┬─ failed ───────────→ Closed
//!                                                 ├─ GET     → cache-aware fetch → Closed
//!                                                 ├─ POST    → forward           → Closed
//!                                                 ├─ CONNECT → 200 + tunnel      → Closed
//!                                                 └─ other   → 400               → Closed
//! ```
//!
//! Upstream transport failures during GET, POST or revalidation become a 502.
//! A failed upstream connect is returned as an error so the connection is
//! dropped without any response. Every response except a CONNECT `200`
//! carries `Connection: close`; a tunnel ends the HTTP exchange by upgrade.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use hyper::body::Incoming;
use hyper::header::{self, HeaderValue};
use hyper::upgrade::OnUpgrade;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::cache::{CacheKey, ResponseCache};
use crate::http::message::{HttpRequest, HttpResponse, ProxyBody};
use crate::http::request::resolve_upstream;
use crate::http::{response, tunnel};
use crate::observability::metrics;
use crate::policy::{self, Cacheability};
use crate::upstream::{UpstreamConnection, UpstreamError};

/// Errors that abort a connection without a response.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("cannot connect to upstream: {0}")]
    UpstreamConnect(#[from] UpstreamError),
}

/// The relay task started by a CONNECT request on one client connection.
///
/// The connection task waits on it, so the connection's permit and tracking
/// guard stay held until the tunnel closes.
#[derive(Debug, Clone, Default)]
pub struct TunnelSlot {
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl TunnelSlot {
    /// An empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&self, task: JoinHandle<()>) {
        *self.task.lock() = Some(task);
    }

    /// Take the relay task, if one was started.
    pub fn take(&self) -> Option<JoinHandle<()>> {
        self.task.lock().take()
    }
}

/// Handles one client request. Cheap to clone; all clones share one cache.
#[derive(Clone)]
pub struct ProxyHandler {
    cache: Arc<ResponseCache>,
    connect_timeout: Option<Duration>,
}

impl ProxyHandler {
    /// Create a handler over a shared cache.
    pub fn new(cache: Arc<ResponseCache>, connect_timeout: Option<Duration>) -> Self {
        Self {
            cache,
            connect_timeout,
        }
    }

    /// The cache shared by every clone of this handler.
    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Serve a single client request. A CONNECT tunnel's relay task is left
    /// in `tunnel`.
    pub async fn handle(
        &self,
        mut request: Request<Incoming>,
        tunnel: &TunnelSlot,
    ) -> Result<Response<ProxyBody>, ProxyError> {
        let start = Instant::now();
        let method = request.method().clone();
        let client_version = request.version();
        let on_upgrade = (method == Method::CONNECT).then(|| hyper::upgrade::on(&mut request));

        let request = match HttpRequest::from_incoming(request).await {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "Invalid request");
                return Ok(respond(&method, start, response::bad_request(client_version)));
            }
        };
        tracing::info!(request = %request, "Received request");

        let Some(host) = request.host().map(str::to_owned) else {
            tracing::warn!("Invalid request: missing Host header");
            return Ok(respond(&request.method, start, response::bad_request(request.version)));
        };
        let (upstream_host, port) = match resolve_upstream(&host) {
            Ok(target) => target,
            Err(e) => {
                tracing::warn!(error = %e, "Invalid request");
                return Ok(respond(&request.method, start, response::bad_request(request.version)));
            }
        };

        let upstream = match UpstreamConnection::connect(&upstream_host, port, self.connect_timeout).await {
            Ok(upstream) => upstream,
            Err(e) => {
                tracing::error!(error = %e, "Cannot connect to server");
                metrics::record_upstream_connect_failure();
                return Err(e.into());
            }
        };

        let reply = match (&request.method, on_upgrade) {
            (&Method::GET, _) => self.get(&request, host, upstream).await,
            (&Method::POST, _) => forward(&request, upstream).await,
            (&Method::CONNECT, Some(on_upgrade)) => {
                tunnel.set(open_tunnel(on_upgrade, upstream));
                response::connection_established()
            }
            (method, _) => {
                tracing::warn!(method = %method, "Unsupported method");
                response::bad_request(request.version)
            }
        };
        Ok(respond(&request.method, start, reply))
    }

    /// Cache-aware GET.
    async fn get(
        &self,
        request: &HttpRequest,
        host: String,
        upstream: UpstreamConnection,
    ) -> HttpResponse {
        let key = CacheKey::new(host, request.target());

        let Some(cached) = self.cache.get(&key) else {
            tracing::info!("not in cache");
            metrics::record_cache_lookup("miss");
            return self.fetch_and_store(key, request, upstream).await;
        };

        if !policy::needs_revalidation(&cached, SystemTime::now()) {
            tracing::info!("in cache, valid");
            metrics::record_cache_lookup("hit");
            return cached;
        }

        if policy::requires_validation_always(&cached) {
            tracing::info!("in cache, requires validation");
        } else if let Some(expiry) = policy::compute_expiry(&cached) {
            tracing::info!("in cache, but expired at {}", policy::format_http_date(expiry));
        }
        metrics::record_cache_lookup("stale");
        self.revalidate(key, request, cached, upstream).await
    }

    async fn fetch_and_store(
        &self,
        key: CacheKey,
        request: &HttpRequest,
        upstream: UpstreamConnection,
    ) -> HttpResponse {
        tracing::info!(request = %request, upstream = %upstream.authority(), "Requesting");
        let fetched = match upstream.send_and_receive(request.clone()).await {
            Ok(fetched) => fetched,
            Err(e) => return upstream_failed(e),
        };
        tracing::info!(status = %fetched.status_line(), "Received");

        match policy::cacheability(&fetched) {
            Cacheability::Storable => {
                let outcome = policy::storage_outcome(&fetched);
                if self.cache.put(key, fetched.clone()) {
                    tracing::info!("{}", outcome);
                } else {
                    tracing::debug!("already cached by a concurrent request");
                }
            }
            Cacheability::NotCacheable(reason) => {
                tracing::info!("not cacheable because \"{}\"", reason);
            }
        }
        fetched
    }

    /// Ask the origin whether `cached` is still current. A `200` replaces the
    /// stored entry; any other status serves the cached copy unchanged.
    async fn revalidate(
        &self,
        key: CacheKey,
        request: &HttpRequest,
        cached: HttpResponse,
        upstream: UpstreamConnection,
    ) -> HttpResponse {
        let conditional = policy::build_conditional_request(request, &cached);
        tracing::info!(request = %conditional, upstream = %upstream.authority(), "Validating");

        let validation = match upstream.send_and_receive(conditional).await {
            Ok(validation) => validation,
            Err(e) => return upstream_failed(e),
        };
        tracing::info!(status = %validation.status_line(), "Received validation");

        if validation.status == StatusCode::OK {
            self.cache.update(&key, validation.clone());
            validation
        } else {
            cached
        }
    }
}

/// Pass-through exchange used for POST.
async fn forward(request: &HttpRequest, upstream: UpstreamConnection) -> HttpResponse {
    tracing::info!(request = %request, upstream = %upstream.authority(), "Requesting");
    match upstream.send_and_receive(request.clone()).await {
        Ok(reply) => {
            tracing::info!(status = %reply.status_line(), "Received");
            reply
        }
        Err(e) => upstream_failed(e),
    }
}

fn upstream_failed(error: UpstreamError) -> HttpResponse {
    tracing::error!(error = %error, "Connection lost");
    response::bad_gateway()
}

/// Relay bytes once hyper has written the `200` and released the client socket.
fn open_tunnel(on_upgrade: OnUpgrade, upstream: UpstreamConnection) -> JoinHandle<()> {
    let task = async move {
        match on_upgrade.await {
            Ok(upgraded) => {
                let stats = tunnel::relay(TokioIo::new(upgraded), upstream.into_stream()).await;
                tracing::info!(
                    client_to_upstream = stats.client_to_upstream,
                    upstream_to_client = stats.upstream_to_client,
                    closed_by = ?stats.closed_by,
                    "Tunnel closed"
                );
            }
            Err(e) => tracing::debug!(error = %e, "Tunnel closed before upgrade"),
        }
    };
    tokio::spawn(task.in_current_span())
}

/// Log the outgoing status line, record metrics and hand the response to hyper.
fn respond(method: &Method, start: Instant, reply: HttpResponse) -> Response<ProxyBody> {
    tracing::info!("Responding \"{}\"", reply.status_line());
    metrics::record_request(method.as_str(), reply.status.as_u16(), start);
    let upgrading = method == Method::CONNECT && reply.status.is_success();
    let mut response = reply.into_hyper();
    if !upgrading {
        response
            .headers_mut()
            .insert(header::CONNECTION, HeaderValue::from_static("close"));
    }
    response
}

/// Log and count a request hyper rejected before it reached the handler.
/// Hyper answers it with a bare `400`.
pub fn log_rejected_request(error: &hyper::Error, start: Instant) {
    tracing::info!(error = %error, "Invalid request");
    tracing::info!("Responding \"{}\"", response::bad_request(hyper::Version::HTTP_11).status_line());
    metrics::record_request("INVALID", StatusCode::BAD_REQUEST.as_u16(), start);
}
