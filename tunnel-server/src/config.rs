//! Server configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use tunnel::{ConfigError, TunnelConfig};

pub const DEFAULT_PORT: u16 = 3005;
pub const DEFAULT_WS_PATH: &str = "ws";

/// Where the tunnel endpoint listens and how its connections behave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Interface to bind
    /// Default: 0.0.0.0
    pub bind_address: IpAddr,

    /// TCP port; 0 lets the OS choose
    /// Default: 3005
    pub port: u16,

    /// Single path segment the WebSocket endpoint is served at
    /// Default: "ws"
    pub ws_path: String,

    /// Per-connection tunnel settings
    pub tunnel: TunnelConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            ws_path: DEFAULT_WS_PATH.to_string(),
            tunnel: TunnelConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loopback on an OS-assigned port.
    pub fn local() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            ..Self::default()
        }
    }

    pub fn with_bind_address(mut self, bind_address: IpAddr) -> Self {
        self.bind_address = bind_address;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_ws_path(mut self, ws_path: impl Into<String>) -> Self {
        self.ws_path = ws_path.into();
        self
    }

    pub fn with_tunnel(mut self, tunnel: TunnelConfig) -> Self {
        self.tunnel = tunnel;
        self
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ws_path.is_empty() {
            return Err(ConfigError("WebSocket path must not be empty".to_string()));
        }

        if self.ws_path.contains('/') {
            return Err(ConfigError(format!(
                "WebSocket path must be a single segment, got {:?}",
                self.ws_path
            )));
        }

        if self.ws_path == "health" {
            return Err(ConfigError(
                "WebSocket path collides with the health route".to_string(),
            ));
        }

        self.tunnel.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 3005);
        assert_eq!(config.ws_path, "ws");
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:3005");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_ws_paths() {
        assert!(ServerConfig::new().with_ws_path("").validate().is_err());
        assert!(ServerConfig::new().with_ws_path("api/ws").validate().is_err());
        assert!(ServerConfig::new().with_ws_path("health").validate().is_err());
        assert!(ServerConfig::new().with_ws_path("tunnel").validate().is_ok());
    }

    #[test]
    fn test_invalid_tunnel_config_is_reported() {
        let config = ServerConfig::local()
            .with_tunnel(TunnelConfig::new().with_rpc_timeout(Duration::ZERO));
        assert!(config.validate().is_err());
    }
}
