//! Wire envelopes exchanged over a device tunnel.
//!
//! Server to device:
//!
//! ```json
//! {"correlationId": "<uuid>", "data": {"type": "command", "commandType": "play"}}
//! ```
//!
//! Device to server is one of a response (same shape), a spontaneous event
//! (`{"async": true, "data": {...}}`) or a heartbeat (`{"ping": "pong"}`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolViolation;
use crate::types::CorrelationId;

/// A command frame sent to the device.
#[derive(Debug, Serialize)]
pub struct OutboundEnvelope<'a> {
    #[serde(rename = "correlationId")]
    pub correlation_id: &'a CorrelationId,
    pub data: &'a Value,
}

impl<'a> OutboundEnvelope<'a> {
    pub fn new(correlation_id: &'a CorrelationId, data: &'a Value) -> Self {
        Self {
            correlation_id,
            data,
        }
    }

    /// Encode the envelope as a text frame.
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// A classified frame received from the device.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// `{"ping": "pong"}` liveness no-op
    Heartbeat,
    /// Reply to an earlier outbound frame
    Response {
        correlation_id: CorrelationId,
        data: Value,
    },
    /// Unsolicited device event
    Async { data: Value },
}

/// Loose view of an inbound frame before classification.
#[derive(Debug, Deserialize)]
struct RawInbound {
    #[serde(rename = "correlationId", default)]
    correlation_id: Option<String>,
    #[serde(default)]
    data: Option<Value>,
    #[serde(rename = "async", default)]
    is_async: Option<bool>,
    #[serde(default)]
    ping: Option<Value>,
}

impl InboundFrame {
    /// Classify a text frame.
    ///
    /// Anything that is not a heartbeat, an async event or a response carrying
    /// both a correlation ID and data is a protocol violation.
    pub fn parse(text: &str) -> Result<Self, ProtocolViolation> {
        let raw: RawInbound = serde_json::from_str(text)
            .map_err(|e| ProtocolViolation::MalformedFrame(e.to_string()))?;

        if raw.ping.as_ref().and_then(Value::as_str) == Some("pong") {
            return Ok(InboundFrame::Heartbeat);
        }

        if raw.is_async == Some(true) {
            let data = present(raw.data).ok_or(ProtocolViolation::MissingData)?;
            return Ok(InboundFrame::Async { data });
        }

        let correlation_id = raw
            .correlation_id
            .filter(|id| !id.is_empty())
            .map(CorrelationId::new)
            .ok_or(ProtocolViolation::MissingCorrelationId)?;
        let data = present(raw.data).ok_or(ProtocolViolation::MissingData)?;

        Ok(InboundFrame::Response {
            correlation_id,
            data,
        })
    }
}

/// `data: null` counts as absent.
fn present(data: Option<Value>) -> Option<Value> {
    data.filter(|value| !value.is_null())
}
