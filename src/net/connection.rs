//! Connection identity and lifecycle tracking.
//!
//! # Responsibilities
//! - Generate monotonic connection IDs for log correlation
//! - Count open connections so shutdown can drain them

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

use crate::observability::metrics;

/// Global atomic counter for connection IDs.
/// Relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Identifier of an accepted client connection, tagged on every log line it produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocate the next ID.
    pub fn next() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw counter value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    active: AtomicU64,
    idle: Notify,
}

/// Tracks open connections for graceful shutdown.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    state: Arc<TrackerState>,
}

impl ConnectionTracker {
    /// Create a tracker with no connections.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new connection. The returned guard carries its ID and
    /// un-records the connection when dropped.
    pub fn track(&self) -> ConnectionGuard {
        let active = self.state.active.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::record_active_connections(active);
        ConnectionGuard {
            state: Arc::clone(&self.state),
            id: ConnectionId::next(),
        }
    }

    /// Get current active connection count.
    pub fn active_count(&self) -> u64 {
        self.state.active.load(Ordering::SeqCst)
    }

    /// Wait until every tracked connection has been dropped.
    pub async fn wait_for_shutdown(&mut self) {
        loop {
            let idle = self.state.idle.notified();
            if self.active_count() == 0 {
                return;
            }
            idle.await;
        }
    }
}

/// Guard that tracks a connection's lifetime.
#[derive(Debug)]
pub struct ConnectionGuard {
    state: Arc<TrackerState>,
    id: ConnectionId,
}

impl ConnectionGuard {
    /// Get this connection's ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let remaining = self.state.active.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::record_active_connections(remaining);
        if remaining == 0 {
            self.state.idle.notify_waiters();
        }
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}
