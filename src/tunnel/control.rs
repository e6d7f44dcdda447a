//! Control messages exchanged before the relay starts.
//!
//! Client → gateway, first frame after upgrade:
//! ```json
//! {"Host": "example.org", "Port": 22}
//! ```
//! Gateway → client, once:
//! ```json
//! {"status": "ok"}
//! {"status": "failed", "error": "dial tcp example.org:22: connection refused"}
//! ```

use std::time::Duration;

use axum::body::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tunnel::io::PayloadReader;

/// Target requested by the client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConnectRequest {
    #[serde(rename = "Host", alias = "host")]
    pub host: String,
    #[serde(rename = "Port", alias = "port")]
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectStatus {
    Ok,
    Failed,
}

/// Negotiation result sent back to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectResponse {
    pub status: ConnectStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConnectResponse {
    pub fn ok() -> Self {
        Self {
            status: ConnectStatus::Ok,
            error: None,
        }
    }

    pub fn failed(error: impl ToString) -> Self {
        Self {
            status: ConnectStatus::Failed,
            error: Some(error.to_string()),
        }
    }

    pub fn to_bytes(&self) -> Result<Bytes, serde_json::Error> {
        serde_json::to_vec(self).map(Bytes::from)
    }
}

/// Reasons the control message could not be obtained. None of these are
/// answered; the session is dropped.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("no control message within {0:?}")]
    Timeout(Duration),

    #[error("connection closed before control message")]
    Closed,

    #[error("control message of {len} bytes exceeds {max} bytes")]
    Oversize { len: usize, max: usize },

    #[error("malformed control message: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("failed to read control message: {0}")]
    Transport(#[from] std::io::Error),
}

/// Decode a control message payload.
pub fn decode_request(payload: &[u8], max_len: usize) -> Result<ConnectRequest, ControlError> {
    if payload.len() > max_len {
        return Err(ControlError::Oversize {
            len: payload.len(),
            max: max_len,
        });
    }
    Ok(serde_json::from_slice(payload)?)
}

/// Read and decode the first message, bounded by `deadline`.
///
/// The deadline covers only this read; once it returns, nothing else on the
/// connection is timed.
pub async fn read_request<R: PayloadReader>(
    reader: &mut R,
    deadline: Duration,
    max_len: usize,
) -> Result<ConnectRequest, ControlError> {
    let payload = tokio::time::timeout(deadline, reader.read_payload())
        .await
        .map_err(|_| ControlError::Timeout(deadline))??
        .ok_or(ControlError::Closed)?;

    decode_request(&payload, max_len)
}
