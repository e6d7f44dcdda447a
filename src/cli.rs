//! Command line flags.
//!
//! Flags (and their environment variables) override values from the config
//! file, which in turn override built-in defaults.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use crate::config::GatewayConfig;

#[derive(Debug, Parser)]
#[command(name = "tunnel-gateway")]
#[command(about = "Tunnels browser WebSocket sessions to TCP targets", long_about = None)]
pub struct Cli {
    /// Listener address, e.g. ":5555" or "0.0.0.0:5555"
    #[arg(long = "pub", env = "PUBLIC_ADDR")]
    pub public_addr: Option<String>,

    /// Listener port (shorthand for --pub)
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Audit log file; an empty value disables connection auditing
    #[arg(long = "al", env = "AUDIT_LOG_FILE")]
    pub audit_log: Option<String>,

    /// Enable debug mode for detailed logging
    #[arg(long, env = "DEBUG")]
    pub debug: bool,

    /// Directory served under the static mount
    #[arg(long, env = "STATIC_DIR")]
    pub static_dir: Option<PathBuf>,

    /// TOML configuration file, watched for blacklist changes
    #[arg(long, env = "GATEWAY_CONFIG")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Overlay the flags that were given onto `config`.
    pub fn apply(&self, config: &mut GatewayConfig) {
        if let Some(addr) = &self.public_addr {
            config.listener.bind_address = normalize_listen_addr(addr);
        }
        if let Some(port) = self.port {
            config.listener.bind_address = with_port(&config.listener.bind_address, port);
        }
        if let Some(path) = &self.audit_log {
            config.audit.path = if path.is_empty() {
                None
            } else {
                Some(PathBuf::from(path))
            };
        }
        if self.debug {
            config.observability.debug = true;
        }
        if let Some(dir) = &self.static_dir {
            config.static_files.dir = Some(dir.clone());
        }
    }
}

/// Expand the host-less `:port` form into a wildcard bind address.
pub fn normalize_listen_addr(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    }
}

fn with_port(addr: &str, port: u16) -> String {
    match addr.parse::<SocketAddr>() {
        Ok(mut parsed) => {
            parsed.set_port(port);
            parsed.to_string()
        }
        Err(_) => match addr.rsplit_once(':') {
            Some((host, _)) => format!("{}:{}", host, port),
            None => format!("{}:{}", addr, port),
        },
    }
}
