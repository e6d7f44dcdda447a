//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the WebSocket endpoint
//! - Optionally serve a static client directory with cache headers
//! - Wire up request tracing
//! - Serve until the shutdown signal, then stop accepting upgrades

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::Request,
    http::{header, HeaderValue},
    middleware::{self, Next},
    response::Response,
    routing::get,
    Router,
};
use chrono::{Duration as ChronoDuration, Utc};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::config::GatewayConfig;
use crate::http::websocket::ws_handler;
use crate::net::SessionTracker;
use crate::observability::AuditLog;
use crate::security::{AdmissionController, Blacklists, DestinationPolicy};

/// File extensions served with long-lived cache headers.
const STATIC_ASSET_EXTENSIONS: [&str; 13] = [
    ".css", ".js", ".png", ".jpg", ".jpeg", ".gif", ".ico", ".svg", ".woff", ".woff2", ".ttf",
    ".eot", ".wasm",
];

const STATIC_MAX_AGE_SECS: i64 = 3600;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub admission: Arc<AdmissionController>,
    pub policy: DestinationPolicy,
    pub audit: Arc<AuditLog>,
    pub sessions: SessionTracker,
}

/// WebSocket tunnel gateway.
pub struct GatewayServer {
    router: Router,
    config: Arc<GatewayConfig>,
    sessions: SessionTracker,
    blacklists: Blacklists,
}

impl GatewayServer {
    /// Create a new gateway with the given configuration and audit sink.
    pub fn new(config: GatewayConfig, audit: AuditLog) -> Self {
        let blacklists = Blacklists::new(
            config.admission.blacklisted_sources.clone(),
            config.destination.blacklisted_hosts.clone(),
        );
        let config = Arc::new(config);
        let sessions = SessionTracker::new();

        let state = AppState {
            config: config.clone(),
            admission: Arc::new(AdmissionController::new(blacklists.clone(), &config.admission)),
            policy: DestinationPolicy::new(blacklists.clone()),
            audit: Arc::new(audit),
            sessions: sessions.clone(),
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            sessions,
            blacklists,
        }
    }

    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let mut router = Router::new()
            .route(&config.listener.ws_path, get(ws_handler))
            .with_state(state);

        if let Some(dir) = &config.static_files.dir {
            tracing::info!(dir = %dir.display(), mount = %config.static_files.mount, "Serving static files");
            let assets = Router::new()
                .nest_service(&config.static_files.mount, ServeDir::new(dir))
                .layer(middleware::from_fn(static_cache_headers));
            router = router.merge(assets);
        }

        router.layer(TraceLayer::new_for_http())
    }

    /// Run the server until `shutdown` fires.
    ///
    /// Returns once the listener has stopped. Upgraded sessions keep running
    /// on their own tasks; wait for them with [`crate::lifecycle::drain`].
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            ws_path = %self.config.listener.ws_path,
            "Gateway listening"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("Listener stopped");
        Ok(())
    }

    /// Tracker of live sessions, for draining.
    pub fn sessions(&self) -> SessionTracker {
        self.sessions.clone()
    }

    /// Shared blacklists, for hot reload.
    pub fn blacklists(&self) -> Blacklists {
        self.blacklists.clone()
    }
}

pub fn is_static_asset(path: &str) -> bool {
    let path = path.to_ascii_lowercase();
    STATIC_ASSET_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

async fn static_cache_headers(request: Request, next: Next) -> Response {
    let cacheable = is_static_asset(request.uri().path());
    let mut response = next.run(request).await;

    if cacheable && response.status().is_success() {
        let headers = response.headers_mut();
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("public, max-age=3600"),
        );
        let expires = (Utc::now() + ChronoDuration::seconds(STATIC_MAX_AGE_SECS))
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string();
        if let Ok(value) = HeaderValue::from_str(&expires) {
            headers.insert(header::EXPIRES, value);
        }
    }
    response
}
