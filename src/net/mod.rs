//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Upgraded WebSocket
//!     → session.rs (correlation id, active-session guard)
//!     → dial.rs (bounded TCP connect to the requested target)
//!     → Hand off to tunnel relay
//! ```
//!
//! # Design Decisions
//! - Each session tracked for graceful shutdown
//! - Every dial has a deadline

pub mod dial;
pub mod session;

pub use dial::{dial, DialError};
pub use session::{SessionGuard, SessionId, SessionTracker};
