//! Error types for the command facade.

use tunnel::{DeviceId, DirectoryError, TunnelError};

/// Typed failures of a device command.
///
/// Reachability and ownership failures are reported before any RPC is issued.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// The device has no live connection
    #[error("Device {0} is not connected")]
    DeviceUnreachable(DeviceId),

    /// The caller does not own the device
    #[error("User {username} is not owner of device {device_id}")]
    NotOwner { username: String, device_id: DeviceId },

    /// The device firmware does not know the command
    #[error("Device can't handle the requested command")]
    UnknownCommand,

    /// The device reported some other error
    #[error("Device reported error: {0}")]
    UnknownDeviceError(String),

    /// The call itself failed; the device should be treated as unresponsive
    #[error("RPC failed: {0}")]
    RpcFailed(#[from] TunnelError),

    /// The ownership store could not answer
    #[error("Ownership check failed: {0}")]
    Ownership(#[from] DirectoryError),

    /// The device answered with something that does not fit the request
    #[error("Invalid response from device: {0}")]
    InvalidResponse(String),
}

impl CommandError {
    /// Whether the device stayed silent past the RPC deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, CommandError::RpcFailed(error) if error.is_timeout())
    }
}

/// Convenience type alias for Results using CommandError.
pub type Result<T> = std::result::Result<T, CommandError>;
