//! Error types for the tunnel crate.
//!
//! Errors are split by blast radius: [`TunnelError`] is local to a single call,
//! while a [`ProtocolViolation`] is fatal to the connection that produced it.

use std::time::Duration;

use crate::types::{CorrelationId, DeviceId};

/// Call-local failures of the correlated RPC channel.
///
/// None of these affect other in-flight calls on the same connection.
#[derive(Debug, thiserror::Error)]
pub enum TunnelError {
    /// No matching response arrived before the call's deadline
    #[error("RPC call {correlation_id} timed out after {timeout:?}")]
    Timeout {
        /// The abandoned call
        correlation_id: CorrelationId,
        /// The timeout that elapsed
        timeout: Duration,
    },

    /// The connection went away before a response arrived
    #[error("Connection closed before a response arrived")]
    ConnectionClosed,

    /// The outbound payload could not be encoded
    #[error("Failed to serialize outbound frame: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TunnelError {
    /// Whether the device stayed silent, as opposed to the connection failing.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TunnelError::Timeout { .. })
    }
}

/// Inbound frames that break the wire protocol. Each one closes the connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolViolation {
    /// The frame is not a JSON object of a known shape
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// A non-heartbeat, non-async frame without a correlation ID
    #[error("Response frame has no correlationId")]
    MissingCorrelationId,

    /// A response whose correlation ID matches no outstanding call
    #[error("No outstanding call for correlationId {0}")]
    UnknownCorrelationId(CorrelationId),

    /// A frame that is missing its `data` member
    #[error("Frame has no data")]
    MissingData,
}

/// Errors from registry operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Another connection already holds this device identity
    #[error("Device {0} is already connected")]
    AlreadyConnected(DeviceId),
}

/// Failures of the external device-ownership store.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// The store could not be reached or answered with an error
    #[error("Device directory unavailable: {0}")]
    Unavailable(String),

    /// A seed file could not be read
    #[error("Failed to read device directory: {0}")]
    Io(#[from] std::io::Error),

    /// A seed file could not be parsed
    #[error("Failed to parse device directory: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failure reported by an async message handler.
///
/// Returning this from a handler closes the device connection, so handlers only
/// use it for payloads that are unusable at the envelope level.
#[derive(Debug, thiserror::Error)]
pub enum AsyncHandlerError {
    #[error("Malformed async message: {0}")]
    MalformedMessage(String),
}

/// Invalid tunnel configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Configuration error: {0}")]
pub struct ConfigError(pub String);

/// Convenience type alias for Results using TunnelError.
pub type Result<T> = std::result::Result<T, TunnelError>;
