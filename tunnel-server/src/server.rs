//! WebSocket server that Kodi devices dial into.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::json;
use tokio::sync::oneshot;
use tunnel::{AsyncMessageHandler, ConnectionRegistry, DeviceDirectory};
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::auth::{AuthGate, AuthenticatedDevice, ADDON_VERSION_HEADER};
use crate::config::ServerConfig;
use crate::connection::{serve_connection, ConnectionContext};
use crate::error::{AuthError, Result, ServerError};

/// Tunnel endpoint for Kodi devices.
///
/// Serves the WebSocket route at `/<ws_path>` and a `GET /health` liveness
/// route. Handshakes are authenticated before the upgrade; admitted devices are
/// registered in the shared [`ConnectionRegistry`] for as long as their socket
/// stays open.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use tunnel::{ConnectionRegistry, DiscardAsyncMessages, InMemoryDeviceDirectory};
/// use tunnel_server::{ServerConfig, TunnelServer};
///
/// #[tokio::main]
/// async fn main() {
///     let registry = Arc::new(ConnectionRegistry::new());
///     let directory = Arc::new(InMemoryDeviceDirectory::new());
///
///     let server = TunnelServer::bind(
///         ServerConfig::default(),
///         registry,
///         directory,
///         Arc::new(DiscardAsyncMessages),
///     )
///     .await
///     .expect("Failed to start tunnel server");
///
///     println!("Devices connect to {}", server.ws_url());
///     server.shutdown().await;
/// }
/// ```
pub struct TunnelServer {
    local_addr: SocketAddr,
    ws_path: String,
    registry: Arc<ConnectionRegistry>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server_handle: Option<tokio::task::JoinHandle<()>>,
}

impl TunnelServer {
    /// Bind the configured address and start serving.
    pub async fn bind(
        config: ServerConfig,
        registry: Arc<ConnectionRegistry>,
        directory: Arc<dyn DeviceDirectory>,
        ingress: Arc<dyn AsyncMessageHandler>,
    ) -> Result<Self> {
        let routes = Self::routes(&config, Arc::clone(&registry), directory, ingress)?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let address = config.socket_addr();
        let (local_addr, server) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(address, async move {
                let _ = shutdown_rx.await;
            })
            .map_err(|source| ServerError::Bind { address, source })?;

        tracing::info!(
            address = %local_addr,
            path = %config.ws_path,
            rpc_timeout_secs = config.tunnel.rpc_timeout.as_secs(),
            "Tunnel server listening"
        );

        let server_handle = tokio::spawn(server);

        Ok(Self {
            local_addr,
            ws_path: config.ws_path,
            registry,
            shutdown_tx: Some(shutdown_tx),
            server_handle: Some(server_handle),
        })
    }

    /// Build the server's warp filter without binding a socket.
    pub fn routes(
        config: &ServerConfig,
        registry: Arc<ConnectionRegistry>,
        directory: Arc<dyn DeviceDirectory>,
        ingress: Arc<dyn AsyncMessageHandler>,
    ) -> Result<impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone> {
        config.validate()?;

        let gate = AuthGate::new(directory);
        let context = ConnectionContext {
            registry: Arc::clone(&registry),
            ingress,
            config: config.tunnel.clone(),
        };

        let tunnel_route = warp::path(config.ws_path.clone())
            .and(warp::path::end())
            .and(with_authentication(gate))
            .and(warp::ws())
            .map(move |device: AuthenticatedDevice, ws: warp::ws::Ws| {
                let context = context.clone();
                ws.on_upgrade(move |socket| serve_connection(socket, device, context))
            });

        let health_route = warp::path("health")
            .and(warp::path::end())
            .and(warp::get())
            .map(move || {
                warp::reply::json(&json!({
                    "status": "ok",
                    "connectedDevices": registry.len(),
                }))
            });

        Ok(tunnel_route.or(health_route).recover(handle_rejection))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// URL devices connect to.
    pub fn ws_url(&self) -> String {
        format!("ws://{}/{}", self.local_addr, self.ws_path)
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Stop accepting connections, close every live tunnel, and wait for the
    /// listener to finish.
    pub async fn shutdown(mut self) {
        let closing = self.registry.disconnect_all();
        tracing::info!(connections = closing, "Shutting down tunnel server");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(handle) = self.server_handle.take() {
            let _ = handle.await;
        }
    }
}

fn with_authentication(
    gate: AuthGate,
) -> impl Filter<Extract = (AuthenticatedDevice,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(warp::header::optional::<String>(ADDON_VERSION_HEADER))
        .and_then(move |authorization: Option<String>, addon_version: Option<String>| {
            let gate = gate.clone();
            async move {
                gate.authenticate(authorization.as_deref(), addon_version)
                    .await
                    .map_err(|error| {
                        tracing::warn!(%error, "Rejecting device handshake");
                        warp::reject::custom(HandshakeRejected(error))
                    })
            }
        })
}

/// Rejection carrying the reason a handshake was refused.
#[derive(Debug)]
struct HandshakeRejected(AuthError);

impl warp::reject::Reject for HandshakeRejected {}

async fn handle_rejection(err: Rejection) -> std::result::Result<impl Reply, Infallible> {
    let (code, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found")
    } else if let Some(HandshakeRejected(error)) = err.find::<HandshakeRejected>() {
        match error {
            AuthError::Directory(_) => (StatusCode::SERVICE_UNAVAILABLE, "Device directory unavailable"),
            _ => (StatusCode::UNAUTHORIZED, "Unauthorized"),
        }
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    } else {
        (StatusCode::BAD_REQUEST, "Bad request")
    };

    Ok(warp::reply::with_status(message, code))
}

impl Drop for TunnelServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
