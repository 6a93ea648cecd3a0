//! Device authentication gate.
//!
//! A connecting device presents `Authorization: Basic base64(username:secret)`
//! on the WebSocket handshake. The gate parses the pair and resolves it to a
//! device identity through the [`DeviceDirectory`] before the upgrade is
//! accepted. Every failure fails closed: the handshake is refused and nothing is
//! registered.

use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tunnel::{DeviceDirectory, DeviceId};

use crate::error::AuthError;

/// Handshake header carrying the add-on version.
pub const ADDON_VERSION_HEADER: &str = "addonversion";

/// A username and secret taken from a Basic `Authorization` header.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    secret: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
        }
    }

    /// Parse the value of an `Authorization` header.
    ///
    /// The scheme is matched case-insensitively. Both halves must be non-empty.
    pub fn parse_basic(header: &str) -> Result<Self, AuthError> {
        let (scheme, encoded) = header
            .trim()
            .split_once(' ')
            .ok_or_else(|| AuthError::MalformedCredentials("missing scheme".to_string()))?;

        if !scheme.eq_ignore_ascii_case("basic") {
            return Err(AuthError::MalformedCredentials(format!(
                "unsupported scheme {scheme}"
            )));
        }

        let decoded = STANDARD
            .decode(encoded.trim())
            .map_err(|e| AuthError::MalformedCredentials(format!("invalid base64: {e}")))?;
        let decoded = String::from_utf8(decoded)
            .map_err(|_| AuthError::MalformedCredentials("credentials are not UTF-8".to_string()))?;

        let (username, secret) = decoded
            .split_once(':')
            .ok_or_else(|| AuthError::MalformedCredentials("missing ':' separator".to_string()))?;

        if username.is_empty() || secret.is_empty() {
            return Err(AuthError::MalformedCredentials(
                "username and secret must both be present".to_string(),
            ));
        }

        Ok(Self::new(username, secret))
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Encode as an `Authorization` header value.
    pub fn to_header_value(&self) -> String {
        format!(
            "Basic {}",
            STANDARD.encode(format!("{}:{}", self.username, self.secret))
        )
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// A handshake that passed the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedDevice {
    pub username: String,
    pub device_id: DeviceId,
    pub addon_version: Option<String>,
}

/// Admits or refuses connection handshakes.
#[derive(Clone)]
pub struct AuthGate {
    directory: Arc<dyn DeviceDirectory>,
}

impl AuthGate {
    pub fn new(directory: Arc<dyn DeviceDirectory>) -> Self {
        Self { directory }
    }

    /// Authenticate a handshake from its raw `Authorization` and add-on version
    /// headers.
    pub async fn authenticate(
        &self,
        authorization: Option<&str>,
        addon_version: Option<String>,
    ) -> Result<AuthenticatedDevice, AuthError> {
        let header = authorization.ok_or(AuthError::MissingCredentials)?;
        let credentials = Credentials::parse_basic(header)?;

        tracing::info!(
            username = %credentials.username,
            addon_version = addon_version.as_deref().unwrap_or("unknown"),
            "Kodi device connecting"
        );

        let device_id = self
            .directory
            .resolve_device_identity(&credentials.username, credentials.secret())
            .await?
            .ok_or_else(|| AuthError::UnknownDevice {
                username: credentials.username.clone(),
            })?;

        tracing::debug!(username = %credentials.username, device_id = %device_id, "Device found");

        Ok(AuthenticatedDevice {
            username: credentials.username,
            device_id,
            addon_version,
        })
    }
}

impl fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthGate").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tunnel::InMemoryDeviceDirectory;

    fn gate() -> AuthGate {
        let directory = InMemoryDeviceDirectory::new();
        directory.add_device("alice", "s3cret", "dev-1");
        AuthGate::new(Arc::new(directory))
    }

    #[test]
    fn test_parse_basic() {
        // "alice:s3cret"
        let credentials = Credentials::parse_basic("Basic YWxpY2U6czNjcmV0").unwrap();
        assert_eq!(credentials.username, "alice");
        assert_eq!(credentials.secret(), "s3cret");

        let lowercase = Credentials::parse_basic("basic YWxpY2U6czNjcmV0").unwrap();
        assert_eq!(lowercase, credentials);
    }

    #[test]
    fn test_secret_may_contain_colons() {
        let header = Credentials::new("alice", "a:b:c").to_header_value();
        let credentials = Credentials::parse_basic(&header).unwrap();
        assert_eq!(credentials.username, "alice");
        assert_eq!(credentials.secret(), "a:b:c");
    }

    #[test]
    fn test_parse_basic_rejects_malformed_headers() {
        for header in [
            "",
            "Basic",
            "Bearer YWxpY2U6czNjcmV0",
            "Basic !!!notbase64",
            // "alice"
            "Basic YWxpY2U=",
            // ":s3cret"
            "Basic OnMzY3JldA==",
            // "alice:"
            "Basic YWxpY2U6",
        ] {
            assert!(
                matches!(
                    Credentials::parse_basic(header),
                    Err(AuthError::MalformedCredentials(_))
                ),
                "accepted {header:?}"
            );
        }
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", Credentials::new("alice", "s3cret"));
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("s3cret"));
    }

    #[tokio::test]
    async fn test_authenticate_known_device() {
        let header = Credentials::new("alice", "s3cret").to_header_value();
        let device = gate()
            .authenticate(Some(&header), Some("0.4.1".to_string()))
            .await
            .unwrap();

        assert_eq!(device.username, "alice");
        assert_eq!(device.device_id, DeviceId::new("dev-1"));
        assert_eq!(device.addon_version.as_deref(), Some("0.4.1"));
    }

    #[tokio::test]
    async fn test_authenticate_fails_closed() {
        let gate = gate();

        let missing = gate.authenticate(None, None).await;
        assert!(matches!(missing, Err(AuthError::MissingCredentials)));

        let header = Credentials::new("alice", "wrong").to_header_value();
        let unknown = gate.authenticate(Some(&header), None).await;
        assert!(matches!(unknown, Err(AuthError::UnknownDevice { .. })));
    }

    proptest! {
        #[test]
        fn parse_basic_never_panics(header in ".*") {
            let _ = Credentials::parse_basic(&header);
        }

        #[test]
        fn encoded_credentials_parse_back(
            username in "[^:\\s]{1,16}",
            secret in "\\PC{1,32}",
        ) {
            let header = Credentials::new(username.clone(), secret.clone()).to_header_value();
            let parsed = Credentials::parse_basic(&header).unwrap();
            prop_assert_eq!(&parsed.username, &username);
            prop_assert_eq!(parsed.secret(), secret.as_str());
        }
    }
}
