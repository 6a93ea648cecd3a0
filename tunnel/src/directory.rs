//! Interface to the external device-ownership store.
//!
//! The store itself lives outside this workspace. [`DeviceDirectory`] is the seam
//! the authentication gate and the command facade call through;
//! [`InMemoryDeviceDirectory`] backs tests and single-node deployments.

use std::path::Path;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::error::DirectoryError;
use crate::types::DeviceId;

/// Device identity and ownership lookups.
#[async_trait]
pub trait DeviceDirectory: Send + Sync {
    /// Resolve a handshake credential to the device it identifies.
    ///
    /// Returns `Ok(None)` when no device matches the pair.
    async fn resolve_device_identity(
        &self,
        username: &str,
        secret: &str,
    ) -> Result<Option<DeviceId>, DirectoryError>;

    /// Whether `username` owns `device_id`.
    async fn is_owner(&self, username: &str, device_id: &DeviceId) -> Result<bool, DirectoryError>;
}

/// A device as stored in the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEntry {
    pub username: String,
    pub secret: String,
    #[serde(rename = "deviceId")]
    pub device_id: DeviceId,
}

/// Directory kept entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryDeviceDirectory {
    devices: RwLock<Vec<DeviceEntry>>,
}

impl InMemoryDeviceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = DeviceEntry>) -> Self {
        Self {
            devices: RwLock::new(entries.into_iter().collect()),
        }
    }

    /// Load entries from a JSON array of `{username, secret, deviceId}` objects.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, DirectoryError> {
        let contents = std::fs::read_to_string(path)?;
        let entries: Vec<DeviceEntry> = serde_json::from_str(&contents)?;
        Ok(Self::from_entries(entries))
    }

    /// Add a device, replacing any previous entry with the same device ID.
    pub fn add_device(
        &self,
        username: impl Into<String>,
        secret: impl Into<String>,
        device_id: impl Into<DeviceId>,
    ) {
        let entry = DeviceEntry {
            username: username.into(),
            secret: secret.into(),
            device_id: device_id.into(),
        };
        let mut devices = self.devices.write();
        devices.retain(|existing| existing.device_id != entry.device_id);
        devices.push(entry);
    }

    pub fn remove_device(&self, device_id: &DeviceId) -> bool {
        let mut devices = self.devices.write();
        let before = devices.len();
        devices.retain(|existing| &existing.device_id != device_id);
        devices.len() != before
    }

    pub fn len(&self) -> usize {
        self.devices.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.read().is_empty()
    }
}

#[async_trait]
impl DeviceDirectory for InMemoryDeviceDirectory {
    async fn resolve_device_identity(
        &self,
        username: &str,
        secret: &str,
    ) -> Result<Option<DeviceId>, DirectoryError> {
        let devices = self.devices.read();
        Ok(devices
            .iter()
            .find(|entry| {
                entry.username == username
                    && bool::from(entry.secret.as_bytes().ct_eq(secret.as_bytes()))
            })
            .map(|entry| entry.device_id.clone()))
    }

    async fn is_owner(&self, username: &str, device_id: &DeviceId) -> Result<bool, DirectoryError> {
        let devices = self.devices.read();
        Ok(devices
            .iter()
            .any(|entry| &entry.device_id == device_id && entry.username == username))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> InMemoryDeviceDirectory {
        let directory = InMemoryDeviceDirectory::new();
        directory.add_device("alice", "s3cret", "dev-1");
        directory.add_device("bob", "hunter2", "dev-2");
        directory
    }

    #[tokio::test]
    async fn test_resolve_device_identity() {
        let directory = directory();

        let found = directory.resolve_device_identity("alice", "s3cret").await.unwrap();
        assert_eq!(found, Some(DeviceId::new("dev-1")));

        let wrong_secret = directory.resolve_device_identity("alice", "hunter2").await.unwrap();
        assert_eq!(wrong_secret, None);

        let unknown_user = directory.resolve_device_identity("carol", "s3cret").await.unwrap();
        assert_eq!(unknown_user, None);
    }

    #[tokio::test]
    async fn test_is_owner() {
        let directory = directory();
        assert!(directory.is_owner("alice", &DeviceId::new("dev-1")).await.unwrap());
        assert!(!directory.is_owner("alice", &DeviceId::new("dev-2")).await.unwrap());
        assert!(!directory.is_owner("alice", &DeviceId::new("dev-9")).await.unwrap());
    }

    #[tokio::test]
    async fn test_add_device_replaces_existing_entry() {
        let directory = directory();
        directory.add_device("alice", "rotated", "dev-1");

        assert_eq!(directory.len(), 2);
        assert_eq!(
            directory.resolve_device_identity("alice", "s3cret").await.unwrap(),
            None
        );
        assert_eq!(
            directory.resolve_device_identity("alice", "rotated").await.unwrap(),
            Some(DeviceId::new("dev-1"))
        );
    }

    #[test]
    fn test_remove_device() {
        let directory = directory();
        assert!(directory.remove_device(&DeviceId::new("dev-2")));
        assert!(!directory.remove_device(&DeviceId::new("dev-2")));
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn test_from_json_file() {
        let path = std::env::temp_dir().join(format!("kodi-devices-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"[{"username": "alice", "secret": "s3cret", "deviceId": "dev-1"}]"#,
        )
        .unwrap();

        let directory = InMemoryDeviceDirectory::from_json_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(directory.len(), 1);

        let missing = InMemoryDeviceDirectory::from_json_file(&path);
        assert!(matches!(missing, Err(DirectoryError::Io(_))));
    }

    #[tokio::test]
    async fn test_secret_must_match_exactly() {
        let directory = directory();

        for secret in ["s3cre", "s3cret!", "S3CRET", "s3crett", ""] {
            assert_eq!(
                directory.resolve_device_identity("alice", secret).await.unwrap(),
                None,
                "secret {secret:?} should be rejected"
            );
        }
        assert_eq!(
            directory.resolve_device_identity("alice", "s3cret").await.unwrap(),
            Some(DeviceId::new("dev-1"))
        );
    }
}
