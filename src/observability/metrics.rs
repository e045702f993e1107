//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): responses by method, status
//! - `proxy_request_duration_seconds` (histogram): time to respond, by method
//! - `proxy_active_connections` (gauge): current connection count
//! - `proxy_cache_lookups_total` (counter): GET lookups by result (hit, stale, miss)
//! - `proxy_cache_evictions_total` (counter): LRU evictions
//! - `proxy_cache_entries` (gauge): entries currently cached
//! - `proxy_tunnel_bytes_total` (counter): bytes relayed by direction
//! - `proxy_upstream_connect_failures_total` (counter): failed origin connects

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with an HTTP scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, address = %addr, "Failed to install metrics exporter"),
    }
}

/// Record one answered request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("proxy_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

/// Record a GET cache lookup; `result` is one of `hit`, `stale`, `miss`.
pub fn record_cache_lookup(result: &'static str) {
    counter!("proxy_cache_lookups_total", "result" => result).increment(1);
}

/// Record one LRU eviction.
pub fn record_cache_eviction() {
    counter!("proxy_cache_evictions_total").increment(1);
}

/// Set the current number of cached responses.
pub fn record_cache_size(entries: usize) {
    gauge!("proxy_cache_entries").set(entries as f64);
}

/// Set the number of open client connections, tunnels included.
pub fn record_active_connections(count: u64) {
    gauge!("proxy_active_connections").set(count as f64);
}

/// Record bytes relayed through a tunnel; `direction` is `client_to_upstream`
/// or `upstream_to_client`.
pub fn record_tunnel_bytes(direction: &'static str, bytes: u64) {
    counter!("proxy_tunnel_bytes_total", "direction" => direction).increment(bytes);
}

/// Record an origin server that could not be reached.
pub fn record_upstream_connect_failure() {
    counter!("proxy_upstream_connect_failures_total").increment(1);
}
