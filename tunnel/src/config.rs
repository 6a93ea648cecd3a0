//! Configuration types for the tunnel crate
//!
//! This module defines the knobs that control a single device tunnel: how long
//! a call may wait for its response, how long a silent connection is tolerated,
//! and how many outbound frames may queue up behind a slow socket.

use std::time::Duration;

use crate::error::ConfigError;

/// Default time a call waits for its matching response.
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(60);

/// Default time a connection may stay completely silent before it is dropped.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Configuration for device tunnels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelConfig {
    /// Deadline for each RPC call, measured from issuance
    /// Default: 60 seconds
    pub rpc_timeout: Duration,

    /// Close connections that deliver no frame at all (heartbeats included)
    /// for this long. `None` keeps silent connections forever.
    /// Default: 5 minutes
    pub idle_timeout: Option<Duration>,

    /// Capacity of the per-connection outbound frame queue
    /// Default: 256
    pub outbound_buffer: usize,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            rpc_timeout: DEFAULT_RPC_TIMEOUT,
            idle_timeout: Some(DEFAULT_IDLE_TIMEOUT),
            outbound_buffer: 256,
        }
    }
}

impl TunnelConfig {
    /// Create a new TunnelConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the RPC deadline
    pub fn with_rpc_timeout(mut self, rpc_timeout: Duration) -> Self {
        self.rpc_timeout = rpc_timeout;
        self
    }

    /// Set or disable the idle timeout
    pub fn with_idle_timeout(mut self, idle_timeout: Option<Duration>) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rpc_timeout == Duration::ZERO {
            return Err(ConfigError(
                "RPC timeout must be greater than 0".to_string(),
            ));
        }

        if let Some(idle_timeout) = self.idle_timeout {
            if idle_timeout == Duration::ZERO {
                return Err(ConfigError(
                    "Idle timeout must be greater than 0 when enabled".to_string(),
                ));
            }
        }

        if self.outbound_buffer == 0 {
            return Err(ConfigError(
                "Outbound buffer must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TunnelConfig::default();
        assert_eq!(config.rpc_timeout, Duration::from_secs(60));
        assert_eq!(config.idle_timeout, Some(Duration::from_secs(300)));
        assert_eq!(config.outbound_buffer, 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_methods() {
        let config = TunnelConfig::new()
            .with_rpc_timeout(Duration::from_millis(50))
            .with_idle_timeout(None);
        assert_eq!(config.rpc_timeout, Duration::from_millis(50));
        assert_eq!(config.idle_timeout, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_values() {
        let config = TunnelConfig::new().with_rpc_timeout(Duration::ZERO);
        assert!(config.validate().is_err());

        let config = TunnelConfig::new().with_idle_timeout(Some(Duration::ZERO));
        assert!(config.validate().is_err());

        let config = TunnelConfig {
            outbound_buffer: 0,
            ..Default::default()
        };
        let error = config.validate().unwrap_err();
        assert_eq!(
            error.to_string(),
            "Configuration error: Outbound buffer must be greater than 0"
        );
    }
}
