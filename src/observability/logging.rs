//! Structured logging.
//!
//! Session chatter is emitted at `debug`, so the debug flag is what makes it
//! visible. `RUST_LOG` wins over both defaults.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn default_filter(debug: bool) -> &'static str {
    if debug {
        "tunnel_gateway=debug,tower_http=debug"
    } else {
        "tunnel_gateway=info,tower_http=info"
    }
}

/// Initialize the global tracing subscriber.
pub fn init_logging(debug: bool) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(debug).into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
