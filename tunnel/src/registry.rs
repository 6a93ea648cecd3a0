//! Registry of live device connections.
//!
//! The registry is the single source of truth for whether a device is currently
//! reachable. It holds at most one [`ConnectionRecord`] per [`DeviceId`]; a second
//! connection claiming an identity that is already registered is turned away and
//! closed, and the incumbent keeps its entry.

use std::sync::Arc;
use std::time::Instant;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::watch;

use crate::channel::Tunnel;
use crate::error::{RegistryError, Result};
use crate::types::{ConnectionId, DeviceId};

/// One currently-connected device.
///
/// Created once a device has passed the authentication gate, owned by the
/// registry for as long as the underlying stream is open.
#[derive(Debug, Clone)]
pub struct ConnectionRecord {
    /// Device identity this connection authenticated as
    pub device_id: DeviceId,
    /// Account the device belongs to
    pub username: String,
    /// Distinguishes this connection from any other with the same identity
    pub connection_id: ConnectionId,
    /// Add-on version reported in the handshake, if any
    pub addon_version: Option<String>,
    /// When the connection was admitted
    pub connected_at: Instant,
    tunnel: Tunnel,
    shutdown: Arc<watch::Sender<bool>>,
}

impl ConnectionRecord {
    /// Build a record around a tunnel.
    ///
    /// Returns the record together with the receiver the connection driver
    /// watches; it flips to `true` when [`ConnectionRecord::disconnect`] is called.
    pub fn new(
        device_id: DeviceId,
        username: impl Into<String>,
        addon_version: Option<String>,
        tunnel: Tunnel,
    ) -> (Self, watch::Receiver<bool>) {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let record = Self {
            device_id,
            username: username.into(),
            connection_id: ConnectionId::next(),
            addon_version,
            connected_at: Instant::now(),
            tunnel,
            shutdown: Arc::new(shutdown),
        };
        (record, shutdown_rx)
    }

    /// Send a command over this connection and wait for the matched response.
    pub async fn transmit(&self, payload: Value) -> Result<Value> {
        self.tunnel.call(payload).await
    }

    /// Forcibly terminate the underlying stream.
    pub fn disconnect(&self) {
        self.shutdown.send_replace(true);
    }

    /// Whether a disconnect has been requested.
    pub fn is_disconnecting(&self) -> bool {
        *self.shutdown.borrow()
    }

    pub fn tunnel(&self) -> &Tunnel {
        &self.tunnel
    }
}

/// Thread-safe map from device identity to its live connection.
///
/// Every operation is atomic per key, so concurrent register/unregister/lookup
/// calls from different connection tasks never observe a half-applied change.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<DeviceId, ConnectionRecord>,
}

impl ConnectionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a connection under its device identity.
    ///
    /// If the identity is already registered the existing entry is left
    /// untouched, the newcomer is disconnected, and
    /// [`RegistryError::AlreadyConnected`] is returned.
    pub fn register(&self, record: ConnectionRecord) -> std::result::Result<(), RegistryError> {
        match self.connections.entry(record.device_id.clone()) {
            Entry::Occupied(existing) => {
                tracing::warn!(
                    device_id = %record.device_id,
                    username = %record.username,
                    incumbent = %existing.get().connection_id,
                    newcomer = %record.connection_id,
                    "Device already connected, closing new connection"
                );
                record.disconnect();
                Err(RegistryError::AlreadyConnected(record.device_id))
            }
            Entry::Vacant(slot) => {
                tracing::info!(
                    device_id = %record.device_id,
                    username = %record.username,
                    connection_id = %record.connection_id,
                    "Device registered"
                );
                slot.insert(record);
                Ok(())
            }
        }
    }

    /// Remove the entry for a device. Removing an absent entry is a no-op.
    pub fn unregister(&self, device_id: &DeviceId) -> Option<ConnectionRecord> {
        let removed = self.connections.remove(device_id).map(|(_, record)| record);
        if let Some(record) = &removed {
            tracing::info!(
                device_id = %device_id,
                connection_id = %record.connection_id,
                "Device unregistered"
            );
        }
        removed
    }

    /// Remove the entry only if it still belongs to `connection_id`.
    ///
    /// Used by connection close handlers so a closing connection can never evict
    /// an entry it does not own.
    pub fn unregister_connection(&self, device_id: &DeviceId, connection_id: ConnectionId) -> bool {
        self.connections
            .remove_if(device_id, |_, record| record.connection_id == connection_id)
            .is_some()
    }

    /// Look up the live connection for a device.
    pub fn lookup(&self, device_id: &DeviceId) -> Option<ConnectionRecord> {
        self.connections.get(device_id).map(|entry| entry.value().clone())
    }

    pub fn is_connected(&self, device_id: &DeviceId) -> bool {
        self.connections.contains_key(device_id)
    }

    /// Identities of all currently connected devices.
    pub fn connected_devices(&self) -> Vec<DeviceId> {
        self.connections.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Ask every live connection to close. Entries are removed by the
    /// connections' own close handlers.
    pub fn disconnect_all(&self) -> usize {
        let mut count = 0;
        for entry in self.connections.iter() {
            entry.value().disconnect();
            count += 1;
        }
        count
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
