//! Response cache subsystem.
//!
//! # Data Flow
//! ```text
//! GET miss  → policy says storable → ResponseCache::put
//! GET hit   → ResponseCache::get (snapshot, promotes to MRU)
//! 200 on revalidation → ResponseCache::update (recency unchanged)
//! put on a full cache → evict LRU head → log + metric
//! ```
//!
//! # Design Decisions
//! - One owned LRU structure behind a readers-writer lock
//! - Callers only ever receive cloned snapshots
//! - Entries are removed by eviction only

pub mod key;
pub mod store;

pub use key::CacheKey;
pub use store::ResponseCache;
