//! Command facade.
//!
//! Every operation follows the same path: the device must be connected, the
//! caller must own it, then the payload goes over the device's tunnel and the
//! response is checked for a device-reported error.

use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinHandle;
use tunnel::{ConnectionRegistry, DeviceDirectory, DeviceId};

use crate::command::{Command, Query};
use crate::error::{CommandError, Result};
use crate::state::DeviceState;

/// Device error code for commands the add-on does not implement.
pub const UNKNOWN_COMMAND: &str = "unknown_command";

/// Typed command API over the connection registry.
#[derive(Clone)]
pub struct CommandFacade {
    registry: Arc<ConnectionRegistry>,
    directory: Arc<dyn DeviceDirectory>,
}

impl CommandFacade {
    pub fn new(registry: Arc<ConnectionRegistry>, directory: Arc<dyn DeviceDirectory>) -> Self {
        Self {
            registry,
            directory,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Execute a command and return the device's response.
    pub async fn execute(
        &self,
        username: &str,
        device_id: &DeviceId,
        command: &Command,
    ) -> Result<Value> {
        let payload = command.to_payload().map_err(tunnel::TunnelError::from)?;
        tracing::info!(
            username,
            device_id = %device_id,
            command = command.name(),
            "Sending command to Kodi"
        );
        self.rpc(username, device_id, payload).await
    }

    /// Execute a command without waiting for it; failures are logged.
    pub fn execute_detached(
        &self,
        username: impl Into<String>,
        device_id: DeviceId,
        command: Command,
    ) -> JoinHandle<()> {
        let facade = self.clone();
        let username = username.into();

        tokio::spawn(async move {
            if let Err(error) = facade.execute(&username, &device_id, &command).await {
                tracing::error!(
                    username = %username,
                    device_id = %device_id,
                    command = command.name(),
                    %error,
                    "Kodi command failed"
                );
            }
        })
    }

    /// Full current state of the device.
    pub async fn state(&self, username: &str, device_id: &DeviceId) -> Result<DeviceState> {
        let response = self
            .rpc(username, device_id, Query::State.to_payload())
            .await?;
        serde_json::from_value(response)
            .map_err(|e| CommandError::InvalidResponse(format!("state: {e}")))
    }

    /// Capabilities the device reports, or `None` for add-ons too old to report
    /// any.
    pub async fn capabilities(
        &self,
        username: &str,
        device_id: &DeviceId,
    ) -> Result<Option<Vec<Value>>> {
        let response = self
            .rpc(username, device_id, Query::Capabilities.to_payload())
            .await?;

        match response.get("capabilities") {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Array(capabilities)) => Ok(Some(capabilities.clone())),
            Some(other) => Err(CommandError::InvalidResponse(format!(
                "capabilities is not a list: {other}"
            ))),
        }
    }

    /// Seek relative to the current position and return the new position in
    /// milliseconds.
    pub async fn seek(
        &self,
        username: &str,
        device_id: &DeviceId,
        delta_position_secs: f64,
    ) -> Result<i64> {
        let command = Command::Seek {
            delta_position: delta_position_secs,
        };
        let response = self.execute(username, device_id, &command).await?;

        response
            .get("positionMilliseconds")
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                CommandError::InvalidResponse("seek response has no positionMilliseconds".to_string())
            })
    }

    async fn rpc(&self, username: &str, device_id: &DeviceId, payload: Value) -> Result<Value> {
        if !self.registry.is_connected(device_id) {
            return Err(CommandError::DeviceUnreachable(device_id.clone()));
        }

        if !self.directory.is_owner(username, device_id).await? {
            return Err(CommandError::NotOwner {
                username: username.to_string(),
                device_id: device_id.clone(),
            });
        }

        // The device may have dropped while the ownership store was consulted.
        let record = self
            .registry
            .lookup(device_id)
            .ok_or_else(|| CommandError::DeviceUnreachable(device_id.clone()))?;

        let response = record.transmit(payload).await.map_err(|error| {
            if error.is_timeout() {
                tracing::warn!(device_id = %device_id, %error, "RPC timeout");
            } else {
                tracing::error!(device_id = %device_id, %error, "RPC call failed");
            }
            CommandError::from(error)
        })?;

        tracing::debug!(device_id = %device_id, response = %response, "Response from Kodi");
        check_device_error(response)
    }
}

impl std::fmt::Debug for CommandFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandFacade")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Turn a `{"status": "error", "error": ...}` response into a typed error.
fn check_device_error(response: Value) -> Result<Value> {
    if response.get("status").and_then(Value::as_str) != Some("error") {
        return Ok(response);
    }

    match response.get("error").and_then(Value::as_str) {
        Some(UNKNOWN_COMMAND) => Err(CommandError::UnknownCommand),
        Some(other) => Err(CommandError::UnknownDeviceError(other.to_string())),
        None => Err(CommandError::UnknownDeviceError("unspecified".to_string())),
    }
}
