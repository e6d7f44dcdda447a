//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Session pipeline produces:
//!     → logging.rs (structured log events, one `session` span per tunnel)
//!     → audit.rs (append-only lifecycle trail)
//!     → metrics.rs (counters, gauges)
//! ```
//!
//! # Design Decisions
//! - Session id travels as a span field, not a string prefix
//! - Audit writes are best effort and never fail a session
//! - Metrics are cheap (no-op without a recorder)

pub mod audit;
pub mod logging;
pub mod metrics;

pub use audit::{AuditEvent, AuditLog};
