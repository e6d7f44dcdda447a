//! Periodic ping on the client connection.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::tunnel::io::Pinger;

/// Ping every `period` until `done` flips to true or a ping fails.
///
/// Never touches the relay streams; it ends on the completion signal, not on
/// connection closure.
pub async fn run_keepalive<P: Pinger>(pinger: P, period: Duration, mut done: watch::Receiver<bool>) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if *done.borrow() {
            return;
        }
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = pinger.ping().await {
                    tracing::debug!(error = %e, "Failed to write ping");
                    return;
                }
            }
            changed = done.changed() => {
                if changed.is_err() {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tunnel::io::testing::CountingPinger;
    use std::sync::atomic::Ordering;

    #[tokio::test(start_paused = true)]
    async fn pings_on_interval_until_done() {
        let pinger = CountingPinger::default();
        let count = pinger.0.clone();
        let (done_tx, done_rx) = watch::channel(false);

        let task = tokio::spawn(run_keepalive(pinger, Duration::from_secs(20), done_rx));

        tokio::time::sleep(Duration::from_secs(19)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(42)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        done_tx.send(true).unwrap();
        task.await.unwrap();

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_signal_dropped() {
        let (done_tx, done_rx) = watch::channel(false);
        let task = tokio::spawn(run_keepalive(
            CountingPinger::default(),
            Duration::from_secs(20),
            done_rx,
        ));

        drop(done_tx);
        task.await.unwrap();
    }
}
