//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, one `connection` span per client)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stderr or an append-only log file
//!     → Metrics endpoint (Prometheus scrape), when enabled
//! ```
//!
//! Metric recorders are no-ops until `init_metrics` installs an exporter,
//! so the hot path never checks whether metrics are on.

pub mod logging;
pub mod metrics;
