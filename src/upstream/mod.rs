//! Upstream (origin server) client.
//!
//! # Data Flow
//! ```text
//! Host header → (host, port)
//!     → UpstreamConnection::connect (TCP, bounded by connect timeout)
//!     ├─ GET/POST: send_and_receive (one HTTP/1.1 exchange, body buffered)
//!     └─ CONNECT:  into_stream (raw socket for the tunnel)
//! ```
//!
//! # Design Decisions
//! - One connection per client request, one exchange per connection
//! - No retries; every failure is an `UpstreamError` value for the caller
//!   to map onto a client-visible status

pub mod client;

pub use client::{UpstreamConnection, UpstreamError};
