//! WebSocket upgrade endpoint and the per-session pipeline.
//!
//! # Data Flow
//! ```text
//! GET /ws (Upgrade)
//!     → X-Request-ID attached to the 101 response
//!     → admission (blocked: drop, nothing sent)
//!     → negotiation (control message, policy, dial, status reply)
//!     → throttled relay + keepalive
//!     → completion logged and audited
//! ```
//!
//! The session guard is taken before anything else, so every exit path
//! releases it.

use std::net::SocketAddr;

use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    http::{HeaderMap, HeaderValue},
    response::Response,
};
use tracing::Instrument;

use crate::http::server::AppState;
use crate::net::SessionId;
use crate::observability::AuditEvent;
use crate::tunnel::io::{split_websocket, StreamReader, StreamWriter};
use crate::tunnel::{limited_pair, relay, Established, Negotiator};

/// Response header carrying the session correlation id.
pub const X_REQUEST_ID: &str = "x-request-id";

pub async fn ws_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let id = SessionId::new();
    let mut response = ws.on_upgrade(move |socket| run_session(state, socket, id, peer, headers));
    if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    response
}

async fn run_session(
    state: AppState,
    socket: WebSocket,
    id: SessionId,
    peer: SocketAddr,
    headers: HeaderMap,
) {
    let span = tracing::info_span!("session", id = %id.short(), source = tracing::field::Empty);
    handle_session(state, socket, peer, headers)
        .instrument(span)
        .await
}

async fn handle_session(state: AppState, socket: WebSocket, peer: SocketAddr, headers: HeaderMap) {
    let _guard = state.sessions.track();
    tracing::debug!(?headers, "Request headers");

    let admission = state.admission.admit(&headers, peer);
    if let Some(denial) = admission.denial {
        tracing::debug!(sources = %admission.sources, reason = denial.as_str(), "Blocking source");
        return;
    }
    let source = admission.sources.canonical().to_string();
    tracing::Span::current().record("source", source.as_str());
    tracing::debug!(sources = %admission.sources, "Session admitted");

    let (mut ws_reader, mut ws_writer) = split_websocket(socket);
    let negotiator = Negotiator {
        config: &state.config.session,
        policy: &state.policy,
        audit: &state.audit,
        source: &source,
    };
    let Established { request, stream } =
        match negotiator.negotiate(&mut ws_reader, &mut ws_writer).await {
            Ok(established) => established,
            Err(failure) => {
                tracing::debug!(state = %failure.state(), reason = %failure, "Session not established");
                return;
            }
        };

    // From here on every frame to the client is binary payload.
    let (target_read, target_write) = stream.into_split();
    let pinger = ws_writer.clone();
    let (to_target, to_client) =
        limited_pair(StreamWriter::new(target_write), ws_writer, &state.config.throttle);

    let summary = relay(
        (ws_reader, to_client),
        (StreamReader::new(target_read), to_target),
        pinger,
        state.config.session.keepalive_interval(),
    )
    .await;

    tracing::debug!(%summary, "Session finished");
    state.audit.record(
        &source,
        &request.host,
        request.port,
        &AuditEvent::Completed(summary.to_string()),
    );
}
