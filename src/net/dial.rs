//! Outbound TCP dialing.

use std::io;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpStream;

/// Why a target could not be reached. The text is sent back to the client.
#[derive(Debug, Error)]
pub enum DialError {
    #[error("dial tcp {addr}: i/o timeout after {}s", .timeout.as_secs())]
    Timeout { addr: String, timeout: Duration },

    #[error("dial tcp {addr}: {source}")]
    Io {
        addr: String,
        #[source]
        source: io::Error,
    },
}

/// `host:port`, bracketing IPv6 literals.
pub fn target_addr(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

/// Open a TCP connection to exactly `host:port`, giving up after `timeout`.
pub async fn dial(host: &str, port: u16, timeout: Duration) -> Result<TcpStream, DialError> {
    let addr = target_addr(host, port);
    match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(source)) => Err(DialError::Io { addr, source }),
        Err(_) => Err(DialError::Timeout { addr, timeout }),
    }
}
