//! Tunnel subsystem: everything after admission.
//!
//! # Data Flow
//! ```text
//! Upgraded WebSocket (admitted)
//!     → control.rs + negotiate.rs (read target, check policy, dial, answer)
//!     → throttle.rs (wrap both writers around one session quota)
//!     → relay.rs (two copy loops + keepalive.rs until both ends close)
//!     → TransferSummary (logged and audited once)
//! ```
//!
//! # Design Decisions
//! - Payload is opaque; no inspection of the tunneled stream
//! - Relay code is generic over `io.rs` traits, so it runs the same on
//!   WebSocket/TCP endpoints and on in-memory ones in tests

pub mod control;
pub mod io;
pub mod keepalive;
pub mod negotiate;
pub mod relay;
pub mod throttle;

pub use control::{ConnectRequest, ConnectResponse, ControlError};
pub use negotiate::{Established, NegotiationFailure, NegotiationState, Negotiator};
pub use relay::{relay, Direction, TransferSummary};
pub use throttle::{limited_pair, LimitedWriter, SharedQuota};
