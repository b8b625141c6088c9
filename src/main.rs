//! Single-origin reverse proxy (shim).
//!
//! # Architecture Overview
//!
//! ```text
//!                          ┌──────────────────────────────────────────────┐
//!                          │                    SHIM                      │
//!                          │                                              │
//!   Local client           │  ┌──────────┐   upgrade   ┌──────────────┐  │
//!   ───────────────────────┼─▶│ dispatch │────────────▶│ ws bridge    │◀─┼──▶ Upstream (ws/wss)
//!                          │  └────┬─────┘             │ + reconnect  │  │
//!                          │       │ other             └──────────────┘  │
//!                          │       ▼                                     │
//!                          │  ┌──────────┐  rewrite    ┌──────────────┐  │
//!                          │  │ http     │────────────▶│ reqwest      │◀─┼──▶ Upstream (http/https)
//!                          │  │ bridge   │◀────────────│ client       │  │
//!                          │  └──────────┘  headers    └──────────────┘  │
//!                          └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use shim_proxy::config::{read_config, validate_config, ConfigError, ProxyConfig};
use shim_proxy::lifecycle::{signals, Shutdown};
use shim_proxy::observability::{logging, metrics};
use shim_proxy::upstream::install_crypto_provider;
use shim_proxy::HttpServer;

/// How long open WebSocket bridges get to close after shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "shim-proxy")]
#[command(about = "Relay local HTTP/WebSocket traffic to one remote origin", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Upstream base URL (overrides the config file).
    #[arg(short, long)]
    upstream: Option<String>,

    /// Local bind address (overrides the config file).
    #[arg(short, long)]
    bind: Option<String>,

    /// Log level (overrides the config file).
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn into_config(self) -> Result<ProxyConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => ProxyConfig::default(),
        };
        if let Some(upstream) = self.upstream {
            config.upstream.base_url = upstream;
        }
        if let Some(bind) = self.bind {
            config.listener.bind_address = bind;
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config()?;

    logging::init_logging(&config.observability);
    install_crypto_provider();

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.base_url,
        heartbeat_secs = config.websocket.heartbeat_secs,
        reconnect_initial_ms = config.websocket.reconnect_initial_ms,
        reconnect_max_ms = config.websocket.reconnect_max_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let shutdown = Shutdown::new();
    tokio::spawn(signals::shutdown_on_signal(shutdown.clone()));

    let server = HttpServer::new(config, shutdown)?;
    let connections = server.connections();
    server.run(listener).await?;

    if !connections.wait_idle(DRAIN_TIMEOUT).await {
        tracing::warn!(
            remaining = connections.active_count(),
            "WebSocket bridges still open after drain timeout"
        );
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
