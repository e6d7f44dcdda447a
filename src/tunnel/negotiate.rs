//! Target negotiation for one session.
//!
//! ```text
//! OPEN → AWAIT_TARGET → VALIDATE_TARGET → DIALING → ESTABLISHED
//!   └──────────┴───────────────┴─────────────┴────→ FAILED
//! ```
//!
//! Only a dial failure is answered. A missing or malformed control message
//! and a forbidden destination end the session silently. The request is
//! audited as soon as it decodes, before the destination is checked, so
//! refused attempts still show up in the trail.

use std::fmt;

use tokio::net::TcpStream;

use crate::config::SessionConfig;
use crate::net::{dial, DialError};
use crate::observability::{metrics, AuditEvent, AuditLog};
use crate::security::DestinationPolicy;
use crate::tunnel::control::{read_request, ConnectRequest, ConnectResponse, ControlError};
use crate::tunnel::io::{PayloadReader, PayloadWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    AwaitTarget,
    ValidateTarget,
    Dialing,
    Established,
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NegotiationState::AwaitTarget => "AWAIT_TARGET",
            NegotiationState::ValidateTarget => "VALIDATE_TARGET",
            NegotiationState::Dialing => "DIALING",
            NegotiationState::Established => "ESTABLISHED",
        };
        f.write_str(name)
    }
}

/// How a negotiation ended short of `ESTABLISHED`.
#[derive(Debug)]
pub enum NegotiationFailure {
    /// No usable control message. Nothing was sent or audited.
    Control(ControlError),
    /// Destination refused by policy. Audited as a request only.
    Forbidden(ConnectRequest),
    /// Dial failed. The client got a failure response.
    Dial(ConnectRequest, DialError),
}

impl NegotiationFailure {
    /// State the session was in when it failed.
    pub fn state(&self) -> NegotiationState {
        match self {
            NegotiationFailure::Control(_) => NegotiationState::AwaitTarget,
            NegotiationFailure::Forbidden(_) => NegotiationState::ValidateTarget,
            NegotiationFailure::Dial(..) => NegotiationState::Dialing,
        }
    }
}

impl fmt::Display for NegotiationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NegotiationFailure::Control(e) => write!(f, "{}", e),
            NegotiationFailure::Forbidden(request) => {
                write!(f, "connecting to {} is not allowed", request.host)
            }
            NegotiationFailure::Dial(_, e) => write!(f, "{}", e),
        }
    }
}

/// A dialed target ready for relaying.
#[derive(Debug)]
pub struct Established {
    pub request: ConnectRequest,
    pub stream: TcpStream,
}

/// Everything negotiation needs besides the connection itself.
pub struct Negotiator<'a> {
    pub config: &'a SessionConfig,
    pub policy: &'a DestinationPolicy,
    pub audit: &'a AuditLog,
    /// Canonical source address, for the audit trail.
    pub source: &'a str,
}

impl Negotiator<'_> {
    pub async fn negotiate<R, W>(
        &self,
        reader: &mut R,
        writer: &mut W,
    ) -> Result<Established, NegotiationFailure>
    where
        R: PayloadReader,
        W: PayloadWriter,
    {
        let request = read_request(
            reader,
            self.config.handshake_timeout(),
            self.config.max_control_message_bytes,
        )
        .await
        .map_err(NegotiationFailure::Control)?;

        tracing::debug!(host = %request.host, port = request.port, "Connection requested");
        self.record(&request, AuditEvent::ConnectionRequest);

        if !self.policy.is_allowed(&request.host) {
            tracing::warn!(host = %request.host, "Connecting to target is not allowed");
            return Err(NegotiationFailure::Forbidden(request));
        }

        match dial(&request.host, request.port, self.config.dial_timeout()).await {
            Ok(stream) => {
                metrics::record_dial("ok");
                send_response(writer, ConnectResponse::ok()).await;
                self.record(&request, AuditEvent::ConnectionEstablished);
                tracing::debug!(state = %NegotiationState::Established, "Tunnel established");
                Ok(Established { request, stream })
            }
            Err(e) => {
                tracing::debug!(error = %e, "Failed to connect");
                metrics::record_dial("failed");
                self.record(&request, AuditEvent::ConnectionFailed);
                send_response(writer, ConnectResponse::failed(&e)).await;
                Err(NegotiationFailure::Dial(request, e))
            }
        }
    }

    fn record(&self, request: &ConnectRequest, event: AuditEvent) {
        self.audit.record(self.source, &request.host, request.port, &event);
    }
}

/// Send the negotiation result. Failures are logged; the session carries on
/// and will notice a dead client in the relay.
async fn send_response<W: PayloadWriter>(writer: &mut W, response: ConnectResponse) {
    match response.to_bytes() {
        Ok(bytes) => {
            if let Err(e) = writer.write_payload(bytes).await {
                tracing::debug!(error = %e, "Failed to write status");
            }
        }
        Err(e) => tracing::debug!(error = %e, "Failed to encode status"),
    }
}
