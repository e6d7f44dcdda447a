//! Graceful shutdown: stop accepting, then wait for live tunnels.

mod common;

use std::time::Duration;

use futures_util::SinkExt;
use tokio_tungstenite::tungstenite::Message;

use common::*;
use tunnel_gateway::config::ShutdownConfig;
use tunnel_gateway::lifecycle::drain;

#[tokio::test]
async fn active_session_count_follows_tunnels() {
    let target = start_echo_target().await;
    let gateway = start_gateway(test_config()).await;
    assert_eq!(gateway.sessions.active_count(), 0);

    let mut client = open_tunnel(gateway.addr, "198.51.100.20", target).await;
    assert_eq!(gateway.sessions.active_count(), 1);

    client.close(None).await.unwrap();
    gateway.wait_for_idle().await;
    assert_eq!(gateway.sessions.active_count(), 0);
}

#[tokio::test]
async fn drain_waits_for_open_tunnel() {
    let target = start_echo_target().await;
    let gateway = start_gateway(test_config()).await;
    let mut client = open_tunnel(gateway.addr, "198.51.100.21", target).await;

    gateway.shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), gateway.server)
        .await
        .expect("listener did not stop")
        .unwrap()
        .unwrap();

    // The tunnel outlives the listener.
    client.send(Message::binary(b"still here".to_vec())).await.unwrap();
    assert_eq!(next_payload(&mut client).await.unwrap(), b"still here");

    let config = ShutdownConfig {
        drain_poll_ms: 20,
        progress_every: 100,
    };
    let sessions = gateway.sessions.clone();
    let draining = tokio::spawn(async move { drain(&sessions, &config).await });

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!draining.is_finished());

    client.close(None).await.unwrap();
    let polls = tokio::time::timeout(Duration::from_secs(5), draining)
        .await
        .expect("drain did not finish")
        .unwrap();
    assert!(polls >= 5);
}
