//! Startup errors for the assembled service.

use alexa_events::{NotifyError, TokenStoreError};
use tunnel::{ConfigError, DirectoryError};
use tunnel_server::ServerError;

use crate::logging::LoggingError;

#[derive(Debug, thiserror::Error)]
pub enum KodiConnectError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to load device directory: {0}")]
    Directory(#[from] DirectoryError),

    #[error("Failed to load Alexa token store: {0}")]
    Tokens(#[from] TokenStoreError),

    #[error("Failed to set up Alexa event delivery: {0}")]
    Notifier(#[from] NotifyError),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error(transparent)]
    Logging(#[from] LoggingError),
}

pub type Result<T> = std::result::Result<T, KodiConnectError>;
