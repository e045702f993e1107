//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper HTTP/1.1, one request per connection)
//!     → handler.rs (route by method)
//!         GET     → cache lookup / upstream fetch / revalidation
//!         POST    → upstream pass-through
//!         CONNECT → tunnel.rs (blind byte relay)
//!     → response.rs (canned 400 / 502 / 200 replies)
//!     → Send to client
//! ```

pub mod handler;
pub mod message;
pub mod request;
pub mod response;
pub mod server;
pub mod tunnel;

pub use handler::{ProxyError, ProxyHandler};
pub use message::{HttpRequest, HttpResponse, ProxyBody};
pub use server::HttpServer;
