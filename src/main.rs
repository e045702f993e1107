//! Forward HTTP caching proxy.
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────┐
//!                 │                 CACHING PROXY                    │
//!   Client        │  ┌─────────┐   ┌─────────┐   ┌───────────────┐   │
//!   ──────────────┼─▶│   net   │──▶│  http   │──▶│ cache/policy  │   │
//!                 │  │listener │   │ handler │   └───────┬───────┘   │
//!                 │  └─────────┘   └────┬────┘           │ miss/stale│
//!                 │                     │ CONNECT        ▼           │
//!                 │                ┌────▼────┐   ┌───────────────┐   │    Origin
//!   ◀─────────────┼────────────────│ tunnel  │   │   upstream    │◀──┼──▶ Server
//!                 │                └─────────┘   └───────────────┘   │
//!                 └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use caching_proxy::config::{load_config, validate_config, ProxyConfig};
use caching_proxy::lifecycle;
use caching_proxy::observability::logging;
use clap::Parser;

/// Command line options. Flags override values from the config file.
#[derive(Debug, Parser)]
#[command(name = "caching-proxy", version, about = "Forward HTTP caching proxy")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on.
    #[arg(short, long)]
    port: Option<u16>,

    /// Maximum number of cached responses.
    #[arg(long)]
    capacity: Option<usize>,
}

impl Cli {
    fn resolve(&self) -> Result<ProxyConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ProxyConfig::default(),
        };

        if let Some(port) = self.port {
            config.listener.set_port(port);
        }
        if let Some(capacity) = self.capacity {
            config.cache.capacity = capacity;
        }

        if let Err(errors) = validate_config(&config) {
            let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
            return Err(format!("invalid configuration: {}", messages.join("; ")).into());
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = cli.resolve()?;

    logging::init_logging(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        cache_capacity = config.cache.capacity,
        "caching-proxy starting"
    );

    lifecycle::run(config).await?;
    Ok(())
}
