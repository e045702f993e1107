//! Client-facing TCP plumbing.
//!
//! ```text
//! listener.rs   bind, accept, one semaphore permit per open connection
//! connection.rs connection IDs for log correlation, active-connection tracking
//! ```
//!
//! Accepted sockets are handed to `http::server` together with their permit
//! and tracking guard; dropping either releases the slot.

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{ConnectionPermit, Listener, ListenerError};
