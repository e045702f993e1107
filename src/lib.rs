//! Forward HTTP/1.1 caching proxy library.
//!
//! GET responses are cached in a bounded LRU store and revalidated with
//! conditional requests once stale. POST is passed through and CONNECT
//! opens a byte tunnel.

pub mod cache;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod policy;
pub mod upstream;

pub use cache::{CacheKey, ResponseCache};
pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
