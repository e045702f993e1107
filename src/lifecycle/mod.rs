//! Process lifecycle: start, run, stop.
//!
//! # Data Flow
//! ```text
//! startup.rs:  validated ProxyConfig → bind listener → metrics exporter → HttpServer::run
//! signals.rs:  Ctrl-C / SIGTERM → Shutdown::trigger
//! shutdown.rs: broadcast → accept loop exits → in-flight connections drain
//! ```
//!
//! A listener that cannot bind aborts startup with an error. Connections
//! still open when the drain deadline passes are abandoned.

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{run, StartupError};
