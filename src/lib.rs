//! WebSocket to TCP tunnel gateway.
//!
//! Browser clients open a WebSocket, name a TCP destination in a single JSON
//! control message, and from then on the socket carries raw bytes in both
//! directions.

pub mod cli;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod security;
pub mod tunnel;

pub use config::schema::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
