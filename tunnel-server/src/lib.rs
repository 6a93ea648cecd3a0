//! WebSocket endpoint for Kodi device tunnels.
//!
//! Devices dial in, authenticate on the handshake with a Basic
//! `username:secret` credential, and keep the socket open. Each admitted socket
//! becomes a [`tunnel::ConnectionRecord`] in the shared registry; the command
//! layer then reaches the device through that record.
//!
//! - [`TunnelServer`]: binds the listener, serves the routes, shuts down
//!   gracefully.
//! - [`AuthGate`]: resolves handshake credentials to a device identity.

pub mod auth;
pub mod config;
mod connection;
pub mod error;
pub mod server;

pub use auth::{AuthGate, AuthenticatedDevice, Credentials, ADDON_VERSION_HEADER};
pub use config::{ServerConfig, DEFAULT_PORT, DEFAULT_WS_PATH};
pub use error::{AuthError, Result, ServerError};
pub use server::TunnelServer;
