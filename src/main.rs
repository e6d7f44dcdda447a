//! WebSocket to TCP tunnel gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────────┐
//!                    │                   TUNNEL GATEWAY                     │
//!                    │                                                      │
//!   Browser (WS)     │  ┌─────────┐   ┌───────────┐   ┌──────────────────┐  │
//!   ─────────────────┼─▶│  http   │──▶│ security  │──▶│ tunnel           │  │
//!                    │  │ upgrade │   │ admission │   │ negotiate, dial  │  │
//!                    │  └─────────┘   └───────────┘   └────────┬─────────┘  │
//!                    │                                         │            │
//!                    │                                         ▼            │   TCP
//!   ◀────────────────┼──────────── throttled relay + keepalive ◀──────────▶─┼──── Target
//!                    │                                                      │
//!                    │  ┌────────────────────────────────────────────────┐  │
//!                    │  │ config │ observability (logs, audit, metrics)   │  │
//!                    │  │ lifecycle (signals, shutdown drain)             │  │
//!                    │  └────────────────────────────────────────────────┘  │
//!                    └──────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;

use clap::Parser;
use tokio::net::TcpListener;

use tunnel_gateway::cli::Cli;
use tunnel_gateway::config::validation::validate_config;
use tunnel_gateway::config::watcher::{apply_blacklist_updates, ConfigWatcher};
use tunnel_gateway::config::{load_config, ConfigError, GatewayConfig};
use tunnel_gateway::lifecycle::{drain, signals};
use tunnel_gateway::observability::{logging, metrics, AuditLog};
use tunnel_gateway::{GatewayServer, Shutdown};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    cli.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init_logging(config.observability.debug);
    tracing::info!("tunnel-gateway v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let audit = AuditLog::from_config(&config.audit)?;
    if !audit.is_enabled() {
        tracing::info!("Connection auditing disabled");
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        source_blacklist = config.admission.blacklisted_sources.len(),
        destination_blacklist = config.destination.blacklisted_hosts.len(),
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let shutdown_config = config.shutdown.clone();
    let server = GatewayServer::new(config, audit);
    let sessions = server.sessions();

    // Keep the watcher alive for the life of the process.
    let _watcher = match &cli.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            tokio::spawn(apply_blacklist_updates(server.blacklists(), updates));
            match watcher.run() {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to watch config file, hot reload disabled");
                    None
                }
            }
        }
        None => None,
    };

    let shutdown = Shutdown::new();
    let stopped = shutdown.subscribe();
    tokio::spawn(async move {
        signals::interrupt().await;
        shutdown.trigger();
    });

    server.run(listener, stopped).await?;

    tracing::info!(active = sessions.active_count(), "Draining sessions");
    drain(&sessions, &shutdown_config).await;

    tracing::info!("Shutdown complete");
    Ok(())
}
