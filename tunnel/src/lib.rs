//! Correlated RPC over device-initiated tunnels.
//!
//! Kodi devices sit behind NAT and cannot be reached from the internet, so each
//! one dials out and keeps a persistent connection open. This crate provides the
//! transport-agnostic core that lets the server issue synchronous calls over that
//! connection:
//!
//! - [`Tunnel`]: per-connection request/response multiplexer. Every call gets a
//!   fresh correlation ID and its own deadline; responses are matched by ID, not
//!   by arrival order.
//! - [`ConnectionRegistry`]: one live [`ConnectionRecord`] per device identity.
//!   The incumbent connection always wins over a newcomer claiming the same ID.
//! - [`DeviceDirectory`]: the external device-ownership store, as a trait.
//! - [`AsyncMessageHandler`]: receiver for unsolicited device events.
//!
//! The socket itself is owned by the server crate, which pumps outbound frames
//! from the tunnel's queue and feeds inbound text frames to [`Tunnel::dispatch`].
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use serde_json::json;
//! use tokio::sync::mpsc;
//! use tunnel::{DeviceId, Dispatch, Tunnel};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let (tx, mut outbound) = mpsc::channel(16);
//! let tunnel = Tunnel::new(DeviceId::new("dev-1"), tx, Duration::from_secs(60));
//!
//! let caller = tunnel.clone();
//! let call = tokio::spawn(async move { caller.call(json!({"type": "state"})).await });
//!
//! // The device answers with the same correlation ID.
//! let frame: serde_json::Value = serde_json::from_str(&outbound.recv().await.unwrap()).unwrap();
//! let reply = json!({"correlationId": frame["correlationId"], "data": {"state": []}});
//! assert!(matches!(tunnel.dispatch(&reply.to_string()), Ok(Dispatch::Resolved(_))));
//!
//! assert_eq!(call.await.unwrap().unwrap(), json!({"state": []}));
//! # }
//! ```

pub mod channel;
pub mod config;
pub mod directory;
pub mod envelope;
pub mod error;
pub mod handler;
pub mod registry;
pub mod types;

pub use channel::{Dispatch, Tunnel};
pub use config::TunnelConfig;
pub use directory::{DeviceDirectory, DeviceEntry, InMemoryDeviceDirectory};
pub use envelope::InboundFrame;
pub use error::{
    AsyncHandlerError, ConfigError, DirectoryError, ProtocolViolation, RegistryError, Result,
    TunnelError,
};
pub use handler::{AsyncMessageHandler, DiscardAsyncMessages};
pub use registry::{ConnectionRecord, ConnectionRegistry};
pub use types::{ConnectionId, CorrelationId, DeviceId};
