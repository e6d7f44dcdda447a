//! Shutdown coordination for the gateway.

use std::time::Duration;

use tokio::sync::broadcast;

use crate::config::ShutdownConfig;
use crate::net::SessionTracker;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks can subscribe to.
pub struct Shutdown {
    /// Broadcast channel sender.
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Block until no session is active.
///
/// Purely cooperative: sessions are never cut short, so this returns only
/// when the last tunnel closes on its own. Returns the number of polls taken.
pub async fn drain(sessions: &SessionTracker, config: &ShutdownConfig) -> u64 {
    let poll = Duration::from_millis(config.drain_poll_ms);
    let mut polls = 0u64;

    loop {
        let active = sessions.active_count();
        if active == 0 {
            tracing::info!(active, "No active sessions, terminating");
            return polls;
        }
        tokio::time::sleep(poll).await;
        polls += 1;
        if config.progress_every > 0 && polls % config.progress_every == 0 {
            tracing::info!(active, "Sessions still active, waiting");
        }
    }
}
