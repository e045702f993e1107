//! Request inspection.
//!
//! # Responsibilities
//! - Extract the upstream host and port from the `Host` header
//! - Reject authorities that cannot be dialed
//!
//! # Design Decisions
//! - The `Host` header is authoritative, also for absolute-form targets
//! - Port defaults to 80 when absent

use std::str::FromStr;

use hyper::http::uri::Authority;

/// Port used when the `Host` header names none.
pub const DEFAULT_PORT: u16 = 80;

/// The `Host` header could not be turned into a dialable address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid Host header {0:?}")]
pub struct InvalidHost(pub String);

/// Split a `Host` header value into host and port.
///
/// IPv6 literals lose their brackets so the result can be passed straight to
/// a resolver.
pub fn resolve_upstream(host_header: &str) -> Result<(String, u16), InvalidHost> {
    let invalid = || InvalidHost(host_header.to_string());

    let authority = Authority::from_str(host_header.trim()).map_err(|_| invalid())?;
    let host = authority
        .host()
        .trim_start_matches('[')
        .trim_end_matches(']');
    if host.is_empty() {
        return Err(invalid());
    }
    let port = authority.port_u16().unwrap_or(DEFAULT_PORT);
    Ok((host.to_string(), port))
}
