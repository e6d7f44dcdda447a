//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Response;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use tunnel_gateway::net::SessionTracker;
use tunnel_gateway::observability::AuditLog;
use tunnel_gateway::{GatewayConfig, GatewayServer, Shutdown};

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

/// A gateway running on an ephemeral loopback port.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub sessions: SessionTracker,
    pub shutdown: Shutdown,
    pub server: JoinHandle<Result<(), io::Error>>,
    pub audit_path: PathBuf,
    _dir: tempfile::TempDir,
}

impl TestGateway {
    /// Audit messages (the last column) in write order.
    pub fn audit_messages(&self) -> Vec<String> {
        self.audit_lines()
            .iter()
            .map(|line| line.splitn(5, ',').nth(4).unwrap().to_string())
            .collect()
    }

    pub fn audit_lines(&self) -> Vec<String> {
        std::fs::read_to_string(&self.audit_path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Wait until every session has released its guard.
    pub async fn wait_for_idle(&self) {
        tokio::time::timeout(WAIT, async {
            while self.sessions.active_count() > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("sessions did not finish");
    }
}

/// Defaults with the destination blacklist cleared, so loopback targets work.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.destination.blacklisted_hosts.clear();
    config
}

pub async fn start_gateway(mut config: GatewayConfig) -> TestGateway {
    let dir = tempfile::tempdir().unwrap();
    let audit_path = dir.path().join("connections.log");
    config.audit.path = Some(audit_path.clone());
    let audit = AuditLog::from_config(&config.audit).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = GatewayServer::new(config, audit);
    let sessions = server.sessions();
    let shutdown = Shutdown::new();
    let server = tokio::spawn(server.run(listener, shutdown.subscribe()));

    TestGateway {
        addr,
        sessions,
        shutdown,
        server,
        audit_path,
        _dir: dir,
    }
}

/// Start a TCP target that echoes everything back until the peer half-closes.
pub async fn start_echo_target() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut reader, mut writer) = socket.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });
    addr
}

/// A loopback port with nothing listening on it.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Open a WebSocket to the gateway, claiming `source` via X-Forwarded-For.
pub async fn connect(gateway: SocketAddr, source: &str) -> (Client, Response) {
    let mut request = format!("ws://{}/ws", gateway).into_client_request().unwrap();
    request
        .headers_mut()
        .insert("x-forwarded-for", HeaderValue::from_str(source).unwrap());
    tokio_tungstenite::connect_async(request).await.unwrap()
}

pub async fn send_control(client: &mut Client, target: SocketAddr) {
    let message = format!(r#"{{"Host":"{}","Port":{}}}"#, target.ip(), target.port());
    client.send(Message::text(message)).await.unwrap();
}

/// Next data frame, or `None` once the gateway has gone away.
pub async fn next_payload(client: &mut Client) -> Option<Vec<u8>> {
    tokio::time::timeout(WAIT, async {
        loop {
            match client.next().await {
                Some(Ok(Message::Binary(bytes))) => return Some(bytes.to_vec()),
                Some(Ok(Message::Text(text))) => return Some(text.as_bytes().to_vec()),
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(Message::Frame(_))) => continue,
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return None,
            }
        }
    })
    .await
    .expect("gateway neither answered nor closed")
}

/// Establish a tunnel to `target` and return the open client.
pub async fn open_tunnel(gateway: SocketAddr, source: &str, target: SocketAddr) -> Client {
    let (mut client, _) = connect(gateway, source).await;
    send_control(&mut client, target).await;
    let status = next_payload(&mut client).await.expect("no negotiation response");
    assert_eq!(status, br#"{"status":"ok"}"#);
    client
}
