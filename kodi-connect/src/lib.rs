//! Kodi Connect server.
//!
//! Wires the workspace together: the [`tunnel_server::TunnelServer`] accepts
//! device connections into a shared [`tunnel::ConnectionRegistry`], the
//! [`kodi_commands::CommandFacade`] sends Alexa directives over those
//! connections, and [`alexa_events::ChangeReportIngress`] turns the events
//! devices push back into Alexa change reports.
//!
//! ```no_run
//! use kodi_connect::{KodiConnect, Settings};
//! use kodi_commands::Command;
//! use tunnel::DeviceId;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let app = KodiConnect::start(Settings::default()).await?;
//!
//! app.commands()
//!     .execute("alice", &DeviceId::new("living-room"), &Command::Play)
//!     .await?;
//!
//! app.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod logging;

use std::net::SocketAddr;
use std::sync::Arc;

use alexa_events::{ChangeReportIngress, EventNotifier, HttpEventNotifier, InMemoryTokenStore, TokenStore};
use kodi_commands::CommandFacade;
use tunnel::{ConnectionRegistry, DeviceDirectory, InMemoryDeviceDirectory};
use tunnel_server::{ServerConfig, TunnelServer};

pub use config::{Args, Settings};
pub use error::{KodiConnectError, Result};
pub use logging::{init_logging, LoggingError, LoggingMode};

/// A running server and the command facade bound to its connections.
pub struct KodiConnect {
    server: TunnelServer,
    commands: CommandFacade,
}

impl KodiConnect {
    /// Load the configured seed files and start serving.
    pub async fn start(settings: Settings) -> Result<Self> {
        settings.validate()?;

        let directory = match &settings.devices_file {
            Some(path) => {
                let directory = InMemoryDeviceDirectory::from_json_file(path)?;
                tracing::info!(path = %path.display(), devices = directory.len(), "Loaded device directory");
                directory
            }
            None => {
                tracing::warn!("No devices file configured; every device handshake will be rejected");
                InMemoryDeviceDirectory::new()
            }
        };

        let tokens = match &settings.tokens_file {
            Some(path) => {
                let tokens = InMemoryTokenStore::from_json_file(path)?;
                tracing::info!(path = %path.display(), users = tokens.len(), "Loaded Alexa token store");
                tokens
            }
            None => {
                tracing::warn!("No tokens file configured; change reports will be dropped");
                InMemoryTokenStore::new()
            }
        };

        let notifier = HttpEventNotifier::new(settings.gateways)?;

        Self::start_with(
            settings.server,
            Arc::new(directory),
            Arc::new(tokens),
            Arc::new(notifier),
        )
        .await
    }

    /// Start serving with caller-supplied collaborators.
    pub async fn start_with(
        config: ServerConfig,
        directory: Arc<dyn DeviceDirectory>,
        tokens: Arc<dyn TokenStore>,
        notifier: Arc<dyn EventNotifier>,
    ) -> Result<Self> {
        let registry = Arc::new(ConnectionRegistry::new());
        let ingress = Arc::new(ChangeReportIngress::new(tokens, notifier));

        let server = TunnelServer::bind(
            config,
            Arc::clone(&registry),
            Arc::clone(&directory),
            ingress,
        )
        .await?;
        let commands = CommandFacade::new(registry, directory);

        Ok(Self { server, commands })
    }

    /// Facade for sending commands and queries to connected devices.
    pub fn commands(&self) -> &CommandFacade {
        &self.commands
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        self.server.registry()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    pub fn ws_url(&self) -> String {
        self.server.ws_url()
    }

    /// Disconnect every device and stop the listener.
    pub async fn shutdown(self) {
        self.server.shutdown().await;
    }
}
