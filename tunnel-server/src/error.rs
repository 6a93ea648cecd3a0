//! Error types for the tunnel server.

use std::net::SocketAddr;

use tunnel::{ConfigError, DirectoryError};

/// Reasons a connection attempt is refused before it reaches the registry.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The handshake carried no `Authorization` header
    #[error("Missing Authorization header")]
    MissingCredentials,

    /// The header is not a well-formed Basic credential
    #[error("Malformed credentials: {0}")]
    MalformedCredentials(String),

    /// No device matches the presented username and secret
    #[error("No device matches the credentials presented by {username}")]
    UnknownDevice { username: String },

    /// The device directory could not answer
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Errors starting or stopping the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: warp::Error,
    },
}

/// Convenience type alias for Results using ServerError.
pub type Result<T> = std::result::Result<T, ServerError>;
