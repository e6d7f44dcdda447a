//! Bidirectional relay between the client and the dialed target.
//!
//! # Teardown
//! Two copy tasks run independently:
//!
//! ```text
//! up:   client reader ──▶ target writer
//! down: target reader ──▶ client writer
//! ```
//!
//! Whichever loop finishes first (EOF or error) closes the endpoint it writes
//! to and raises the shared teardown flag. The other loop stops at its next
//! read, whether that read fails because its source was closed or the flag
//! wins the race. The session is done once both loops have reported.

use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use crate::observability::metrics;
use crate::tunnel::io::{PayloadReader, PayloadWriter, Pinger};
use crate::tunnel::keepalive::run_keepalive;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client to target.
    Up,
    /// Target to client.
    Down,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

/// Final report of one copy loop.
#[derive(Debug)]
pub struct DirectionStats {
    pub direction: Direction,
    pub bytes: u64,
    pub error: Option<io::Error>,
}

impl DirectionStats {
    fn aborted(direction: Direction) -> Self {
        Self {
            direction,
            bytes: 0,
            error: Some(io::Error::other("copy task aborted")),
        }
    }
}

/// Combined result of a session, always ordered up then down.
#[derive(Debug)]
pub struct TransferSummary {
    pub up: DirectionStats,
    pub down: DirectionStats,
}

impl TransferSummary {
    /// Slot completions into direction order regardless of arrival order.
    fn from_completions(first: DirectionStats, second: DirectionStats) -> Self {
        if first.direction == Direction::Up {
            Self { up: first, down: second }
        } else {
            Self { up: second, down: first }
        }
    }
}

struct ErrorText<'a>(&'a Option<io::Error>);

impl fmt::Display for ErrorText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(e) => write!(f, "{}", e),
            None => f.write_str("none"),
        }
    }
}

impl fmt::Display for TransferSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "proxy finished copied ({}/{})bytes anyerrors ({},{})",
            self.up.bytes,
            self.down.bytes,
            ErrorText(&self.up.error),
            ErrorText(&self.down.error)
        )
    }
}

/// Relay until both directions end, pinging the client meanwhile.
///
/// `client` is the upgraded connection, `target` the dialed one. The writers
/// are expected to be throttled already.
pub async fn relay<CR, CW, TR, TW, P>(
    client: (CR, CW),
    target: (TR, TW),
    pinger: P,
    keepalive: Duration,
) -> TransferSummary
where
    CR: PayloadReader,
    CW: PayloadWriter,
    TR: PayloadReader,
    TW: PayloadWriter,
    P: Pinger,
{
    let (client_reader, client_writer) = client;
    let (target_reader, target_writer) = target;

    let (done_tx, done_rx) = watch::channel(false);
    let keepalive_task = tokio::spawn(run_keepalive(pinger, keepalive, done_rx));

    let (teardown_tx, teardown_rx) = watch::channel(false);
    let teardown_tx = Arc::new(teardown_tx);
    let (stats_tx, mut stats_rx) = mpsc::channel(2);

    spawn_copy(
        client_reader,
        target_writer,
        Direction::Up,
        teardown_rx.clone(),
        Arc::clone(&teardown_tx),
        stats_tx.clone(),
    );
    spawn_copy(
        target_reader,
        client_writer,
        Direction::Down,
        teardown_rx,
        teardown_tx,
        stats_tx,
    );

    let first = stats_rx.recv().await;
    let second = stats_rx.recv().await;
    let summary = match (first, second) {
        (Some(a), Some(b)) => TransferSummary::from_completions(a, b),
        (Some(a), None) => {
            let missing = match a.direction {
                Direction::Up => Direction::Down,
                Direction::Down => Direction::Up,
            };
            TransferSummary::from_completions(a, DirectionStats::aborted(missing))
        }
        _ => TransferSummary::from_completions(
            DirectionStats::aborted(Direction::Up),
            DirectionStats::aborted(Direction::Down),
        ),
    };

    let _ = done_tx.send(true);
    let _ = keepalive_task.await;
    summary
}

fn spawn_copy<R, W>(
    reader: R,
    writer: W,
    direction: Direction,
    teardown: watch::Receiver<bool>,
    trigger: Arc<watch::Sender<bool>>,
    stats: mpsc::Sender<DirectionStats>,
) where
    R: PayloadReader,
    W: PayloadWriter,
{
    tokio::spawn(async move {
        let result = copy_loop(reader, writer, direction, teardown, trigger).await;
        let _ = stats.send(result).await;
    });
}

async fn copy_loop<R, W>(
    mut reader: R,
    mut writer: W,
    direction: Direction,
    mut teardown: watch::Receiver<bool>,
    trigger: Arc<watch::Sender<bool>>,
) -> DirectionStats
where
    R: PayloadReader,
    W: PayloadWriter,
{
    let mut bytes = 0u64;
    let mut error = None;

    loop {
        let chunk = tokio::select! {
            chunk = reader.read_payload() => chunk,
            _ = teardown.changed() => break,
        };
        match chunk {
            Ok(Some(payload)) => {
                let len = payload.len() as u64;
                if let Err(e) = writer.write_payload(payload).await {
                    error = Some(e);
                    break;
                }
                bytes += len;
            }
            Ok(None) => break,
            Err(e) => {
                error = Some(e);
                break;
            }
        }
    }

    // Close-on-first-exit: shut the endpoint we feed so the peer loop's
    // source dries up, then raise the flag in case it is blocked elsewhere.
    if let Err(e) = writer.close().await {
        tracing::trace!(direction = direction.as_str(), error = %e, "Close after copy failed");
    }
    trigger.send_replace(true);

    metrics::record_relay_bytes(direction.as_str(), bytes);
    DirectionStats {
        direction,
        bytes,
        error,
    }
}
