//! Seam for unsolicited device-originated messages.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AsyncHandlerError;
use crate::types::DeviceId;

/// Receives the `data` member of every `{"async": true, ...}` frame.
///
/// Implementations decide what counts as fatal: returning an error closes the
/// device connection, so processing failures that say nothing about the health
/// of the stream should be logged and swallowed instead.
#[async_trait]
pub trait AsyncMessageHandler: Send + Sync {
    async fn handle_async_message(
        &self,
        username: &str,
        device_id: &DeviceId,
        message: Value,
    ) -> Result<(), AsyncHandlerError>;
}

/// Handler that accepts and discards every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardAsyncMessages;

#[async_trait]
impl AsyncMessageHandler for DiscardAsyncMessages {
    async fn handle_async_message(
        &self,
        username: &str,
        device_id: &DeviceId,
        _message: Value,
    ) -> Result<(), AsyncHandlerError> {
        tracing::debug!(username, device_id = %device_id, "Discarding async message");
        Ok(())
    }
}
