//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, tracing, optional static files)
//!     → websocket.rs (upgrade, correlation id, session pipeline)
//!     → tunnel subsystem (negotiate, relay)
//! ```

pub mod server;
pub mod websocket;

pub use server::{AppState, GatewayServer};
pub use websocket::X_REQUEST_ID;
