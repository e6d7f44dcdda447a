//! Per-session throughput limiting.
//!
//! Each session owns one [`SharedQuota`] and wraps both of its writers in a
//! [`LimitedWriter`]. A writer counts only its own bytes; until that count
//! passes the free allowance its writes skip the quota entirely. After that,
//! each of its writes first takes tokens for the write's length from the
//! shared bucket.
//!
//! The allowance is per writer while the bucket is per session. Throttling
//! therefore starts when one direction alone passes the allowance, not when
//! the pair does, and a writer still under its allowance never waits even
//! while the other one has drained the bucket.
//!
//! A client frame can be far larger than the burst, so a throttled write is
//! charged and forwarded in slices of at most `burst` bytes.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use thiserror::Error;
use tokio::time::Instant;

use crate::config::ThrottleConfig;
use crate::tunnel::io::PayloadWriter;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuotaError {
    #[error("write of {requested} bytes exceeds quota burst of {burst} bytes")]
    ExceedsBurst { requested: u64, burst: u64 },
}

#[derive(Debug)]
struct QuotaState {
    /// May go negative: a waiter reserves its tokens up front, then sleeps off
    /// the debt.
    tokens: f64,
    last_update: Instant,
}

/// Token bucket shared by the two writers of one session.
#[derive(Debug)]
pub struct SharedQuota {
    state: Mutex<QuotaState>,
    rate: f64,
    burst: f64,
}

impl SharedQuota {
    /// A full bucket refilling at `rate_bytes_per_sec` up to `burst_bytes`.
    pub fn new(rate_bytes_per_sec: u64, burst_bytes: u64) -> Self {
        Self {
            state: Mutex::new(QuotaState {
                tokens: burst_bytes as f64,
                last_update: Instant::now(),
            }),
            rate: rate_bytes_per_sec as f64,
            burst: burst_bytes as f64,
        }
    }

    /// Largest request [`SharedQuota::wait`] accepts.
    pub fn burst_bytes(&self) -> u64 {
        self.burst as u64
    }

    /// Wait until `n` tokens are available and take them.
    ///
    /// Requests larger than the burst can never be satisfied and fail at once.
    pub async fn wait(&self, n: u64) -> Result<(), QuotaError> {
        if n as f64 > self.burst {
            return Err(QuotaError::ExceedsBurst {
                requested: n,
                burst: self.burst as u64,
            });
        }

        let delay = {
            let mut state = self.state.lock().expect("quota mutex poisoned");
            let now = Instant::now();
            let elapsed = now.duration_since(state.last_update).as_secs_f64();
            state.tokens = (state.tokens + elapsed * self.rate).min(self.burst);
            state.last_update = now;

            state.tokens -= n as f64;
            if state.tokens < 0.0 {
                Duration::from_secs_f64(-state.tokens / self.rate)
            } else {
                Duration::ZERO
            }
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }
}

/// Writer that charges the session quota once its own allowance is used up.
pub struct LimitedWriter<W> {
    inner: W,
    quota: Arc<SharedQuota>,
    free_bytes: u64,
    written: u64,
}

impl<W> LimitedWriter<W> {
    pub fn new(inner: W, quota: Arc<SharedQuota>, free_bytes: u64) -> Self {
        Self {
            inner,
            quota,
            free_bytes,
            written: 0,
        }
    }

    /// Bytes passed through this writer so far.
    pub fn written(&self) -> u64 {
        self.written
    }
}

impl<W: PayloadWriter> PayloadWriter for LimitedWriter<W> {
    async fn write_payload(&mut self, payload: Bytes) -> std::io::Result<()> {
        let throttled = self.written > self.free_bytes;
        self.written += payload.len() as u64;
        if !throttled {
            return self.inner.write_payload(payload).await;
        }

        let slice_len = self.quota.burst_bytes().max(1) as usize;
        let mut offset = 0;
        while offset < payload.len() {
            let end = payload.len().min(offset + slice_len);
            if let Err(e) = self.quota.wait((end - offset) as u64).await {
                // Fail open: a limiter problem must not stall the tunnel.
                tracing::warn!(error = %e, "Limiter wait error");
            }
            self.inner.write_payload(payload.slice(offset..end)).await?;
            offset = end;
        }
        Ok(())
    }

    async fn close(&mut self) -> std::io::Result<()> {
        self.inner.close().await
    }
}

/// Wrap both writers of a session around one fresh quota.
pub fn limited_pair<A, B>(
    upstream: A,
    downstream: B,
    config: &ThrottleConfig,
) -> (LimitedWriter<A>, LimitedWriter<B>) {
    let quota = Arc::new(SharedQuota::new(config.rate_bytes_per_sec, config.burst_bytes));
    (
        LimitedWriter::new(upstream, Arc::clone(&quota), config.free_bytes),
        LimitedWriter::new(downstream, quota, config.free_bytes),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tunnel::io::testing::RecordingWriter;

    fn config(free_bytes: u64) -> ThrottleConfig {
        ThrottleConfig {
            free_bytes,
            rate_bytes_per_sec: 1000,
            burst_bytes: 1000,
        }
    }

    fn chunk(len: usize) -> Bytes {
        Bytes::from(vec![0u8; len])
    }

    #[tokio::test(start_paused = true)]
    async fn no_throttling_within_allowance() {
        let (mut up, _down) = limited_pair(RecordingWriter::default(), RecordingWriter::default(), &config(10_000));
        let start = Instant::now();

        for _ in 0..10 {
            up.write_payload(chunk(1000)).await.unwrap();
        }

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(up.written(), 10_000);
    }

    #[tokio::test(start_paused = true)]
    async fn throttles_at_configured_rate_after_allowance() {
        let (mut up, _down) = limited_pair(RecordingWriter::default(), RecordingWriter::default(), &config(10));

        // Crosses the allowance without consulting the bucket.
        up.write_payload(chunk(11)).await.unwrap();

        let start = Instant::now();
        // The full burst is available immediately...
        up.write_payload(chunk(1000)).await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
        // ...then each further 1000 bytes costs a second.
        up.write_payload(chunk(1000)).await.unwrap();
        up.write_payload(chunk(1000)).await.unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1990), "elapsed {:?}", elapsed);
        assert!(elapsed <= Duration::from_millis(2100), "elapsed {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn allowance_is_per_writer_but_bucket_is_shared() {
        let (mut up, mut down) =
            limited_pair(RecordingWriter::default(), RecordingWriter::default(), &config(1500));

        // Upstream exceeds its own allowance and drains the shared bucket.
        up.write_payload(chunk(1501)).await.unwrap();
        up.write_payload(chunk(1000)).await.unwrap();

        // Downstream is still under its own allowance, so it is not throttled
        // even though the bucket is empty.
        let start = Instant::now();
        down.write_payload(chunk(1000)).await.unwrap();
        down.write_payload(chunk(501)).await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);

        // Once downstream passes its allowance too, it pays into the same
        // bucket upstream emptied.
        down.write_payload(chunk(1000)).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(990));
    }

    #[tokio::test(start_paused = true)]
    async fn write_larger_than_burst_is_charged_in_slices() {
        let inner = RecordingWriter::default();
        let (mut up, _down) = limited_pair(inner.clone(), RecordingWriter::default(), &config(0));

        up.write_payload(chunk(1)).await.unwrap();
        let start = Instant::now();
        // Five burst-sized slices: the first rides the full bucket, each of
        // the other four waits a second.
        up.write_payload(chunk(5000)).await.unwrap();

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(3990), "elapsed {:?}", elapsed);
        assert!(elapsed <= Duration::from_millis(4100), "elapsed {:?}", elapsed);
        assert_eq!(inner.total_bytes(), 5001);
        let sizes: Vec<usize> = inner.chunks.lock().unwrap().iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![1, 1000, 1000, 1000, 1000, 1000]);
        assert_eq!(up.written(), 5001);
    }

    #[tokio::test(start_paused = true)]
    async fn unthrottled_write_is_not_split() {
        let inner = RecordingWriter::default();
        let (mut up, _down) = limited_pair(inner.clone(), RecordingWriter::default(), &config(10_000));

        up.write_payload(chunk(5000)).await.unwrap();
        assert_eq!(inner.chunks.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn quota_rejects_requests_above_burst() {
        let quota = SharedQuota::new(1000, 1000);
        assert_eq!(
            quota.wait(1001).await,
            Err(QuotaError::ExceedsBurst {
                requested: 1001,
                burst: 1000
            })
        );
        assert!(quota.wait(1000).await.is_ok());
    }
}
