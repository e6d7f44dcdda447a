//! Session identity and active-session tracking.
//!
//! # Responsibilities
//! - Generate correlation ids for sessions
//! - Count active sessions process-wide for the shutdown drain

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use uuid::Uuid;

use crate::observability::metrics;

/// Correlation id of one session, also returned as `X-Request-ID`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First eight characters, used in log lines.
    pub fn short(&self) -> String {
        let mut s = self.0.to_string();
        s.truncate(8);
        s
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Tracks active sessions for graceful shutdown.
#[derive(Debug, Clone, Default)]
pub struct SessionTracker {
    active_count: Arc<AtomicU64>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new active session. Returns a guard that decrements on drop.
    pub fn track(&self) -> SessionGuard {
        let active = self.active_count.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::set_active_sessions(active);
        SessionGuard {
            active_count: Arc::clone(&self.active_count),
        }
    }

    /// Get current active session count.
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }
}

/// Guard held for a session's whole lifetime.
///
/// Dropping it is the only way the active count goes down, so every exit path
/// of a session (admission refusal, bad control message, dial failure, relay
/// end, panic) releases its slot exactly once.
#[derive(Debug)]
pub struct SessionGuard {
    active_count: Arc<AtomicU64>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let active = self.active_count.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::set_active_sessions(active);
    }
}
