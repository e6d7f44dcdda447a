//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGINT/SIGTERM → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     Signal received → listener stops accepting upgrades
//!     → drain() polls the active-session count until it reaches zero → Exit
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accept, drain, exit
//! - No deadline: in-flight tunnels are never killed

pub mod shutdown;
pub mod signals;

pub use shutdown::{drain, Shutdown};
