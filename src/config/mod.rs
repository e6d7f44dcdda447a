//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + command line
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//!
//! On file change:
//!     watcher.rs detects change in the file's directory
//!     → loader.rs loads and validates the new file
//!     → BlacklistUpdate (the two blacklists only)
//!     → blacklists swapped under their write locks
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; only blacklists are hot-reloaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdmissionConfig, AuditConfig, DestinationConfig, GatewayConfig, ListenerConfig,
    ObservabilityConfig, SessionConfig, ShutdownConfig, StaticConfig, ThrottleConfig,
};
