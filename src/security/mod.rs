//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Upgraded request:
//!     → admission.rs (candidate sources, source blacklist, per-source rate)
//! Control message decoded:
//!     → destination.rs (target host blacklist)
//! ```
//!
//! # Design Decisions
//! - Blocked requests get no response; the connection is dropped
//! - Blacklists are shared handles so config reload can swap them in place
//! - Per-source buckets live in a bounded LRU registry

pub mod admission;
pub mod blacklist;
pub mod destination;
pub mod rate_limit;

pub use admission::{Admission, AdmissionController, Denial, SourceAddrs};
pub use blacklist::Blacklists;
pub use destination::DestinationPolicy;
pub use rate_limit::SourceRateLimiter;
