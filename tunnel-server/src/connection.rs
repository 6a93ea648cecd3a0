//! Per-connection driver.
//!
//! Owns one upgraded WebSocket for its whole life: registers the device, pumps
//! outbound frames from the tunnel's queue onto the socket, feeds inbound text
//! frames to [`Tunnel::dispatch`], and tears everything down when the stream
//! ends for any reason.
//!
//! Async events are handed to the ingress one at a time, in arrival order, by a
//! single worker per connection.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tracing::Instrument;
use tunnel::{
    AsyncMessageHandler, ConnectionRecord, ConnectionRegistry, Dispatch, Tunnel, TunnelConfig,
};
use warp::ws::{Message, WebSocket};

use crate::auth::AuthenticatedDevice;

/// Time the writer gets to flush a close frame during teardown.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Async events that may wait for the ingress before new ones are dropped.
const ASYNC_QUEUE_CAPACITY: usize = 64;

/// Shared state every connection driver needs.
#[derive(Clone)]
pub(crate) struct ConnectionContext {
    pub registry: Arc<ConnectionRegistry>,
    pub ingress: Arc<dyn AsyncMessageHandler>,
    pub config: TunnelConfig,
}

/// Why a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseReason {
    RemoteClosed,
    TransportError,
    ProtocolViolation,
    Disconnected,
    IdleTimeout,
}

pub(crate) async fn serve_connection(
    socket: WebSocket,
    device: AuthenticatedDevice,
    context: ConnectionContext,
) {
    let span = tracing::info_span!(
        "device_connection",
        device_id = %device.device_id,
        username = %device.username,
    );
    drive(socket, device, context).instrument(span).await
}

async fn drive(socket: WebSocket, device: AuthenticatedDevice, context: ConnectionContext) {
    let (mut sink, mut stream) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(context.config.outbound_buffer);

    let tunnel = Tunnel::new(
        device.device_id.clone(),
        outbound_tx,
        context.config.rpc_timeout,
    );
    let (record, mut shutdown_rx) = ConnectionRecord::new(
        device.device_id.clone(),
        device.username.clone(),
        device.addon_version.clone(),
        tunnel.clone(),
    );
    let connection_id = record.connection_id;
    let handle = record.clone();

    if context.registry.register(record).is_err() {
        tunnel.close();
        let _ = sink.send(Message::close()).await;
        let _ = sink.close().await;
        return;
    }

    tracing::info!(
        connection_id = %connection_id,
        addon_version = device.addon_version.as_deref().unwrap_or("unknown"),
        "Kodi device connected"
    );

    let (stop_writer, mut writer_stopped) = oneshot::channel::<()>();
    let mut writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = &mut writer_stopped => break,
                frame = outbound_rx.recv() => {
                    let Some(text) = frame else { break };
                    if let Err(error) = sink.send(Message::text(text)).await {
                        tracing::debug!(%error, "Failed to write frame");
                        break;
                    }
                }
            }
        }
        let _ = sink.send(Message::close()).await;
        let _ = sink.close().await;
    });

    let async_events = spawn_async_worker(&context, &device, &handle);

    let idle_timeout = context.config.idle_timeout;
    let reason = loop {
        let idle = async {
            match idle_timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending().await,
            }
        };

        let next = tokio::select! {
            next = stream.next() => next,
            _ = shutdown_rx.changed() => break CloseReason::Disconnected,
            _ = idle => break CloseReason::IdleTimeout,
        };

        let message = match next {
            None => break CloseReason::RemoteClosed,
            Some(Err(error)) => {
                tracing::debug!(%error, "WebSocket error");
                break CloseReason::TransportError;
            }
            Some(Ok(message)) => message,
        };

        if message.is_close() {
            break CloseReason::RemoteClosed;
        }
        // Transport-level pings are answered by the WebSocket layer.
        if message.is_ping() || message.is_pong() {
            continue;
        }

        let Ok(text) = message.to_str() else {
            tracing::warn!("Binary frame received, closing connection");
            break CloseReason::ProtocolViolation;
        };

        match tunnel.dispatch(text) {
            Ok(Dispatch::Heartbeat) => tracing::trace!("Heartbeat"),
            Ok(Dispatch::Resolved(correlation_id)) => {
                tracing::trace!(correlation_id = %correlation_id, "Response matched");
            }
            Ok(Dispatch::Async(data)) => match async_events.try_send(data) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!("Async event queue full, dropping event");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::debug!("Async worker stopped, dropping event");
                }
            },
            Err(violation) => {
                tracing::warn!(error = %violation, "Protocol violation, closing connection");
                break CloseReason::ProtocolViolation;
            }
        }
    };

    context
        .registry
        .unregister_connection(&device.device_id, connection_id);
    let drained = tunnel.close();

    // Queued events are still delivered; the worker exits once they are done.
    drop(async_events);

    let _ = stop_writer.send(());
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer).await.is_err() {
        // A writer stuck on a stalled socket would keep the outbound queue open.
        writer.abort();
        tracing::debug!("Writer did not finish in time, aborted");
    }

    match reason {
        CloseReason::IdleTimeout => tracing::warn!(
            connection_id = %connection_id,
            drained,
            "Kodi device silent for too long, connection closed"
        ),
        _ => tracing::info!(
            connection_id = %connection_id,
            ?reason,
            drained,
            "Kodi device disconnected"
        ),
    }
}

fn spawn_async_worker(
    context: &ConnectionContext,
    device: &AuthenticatedDevice,
    handle: &ConnectionRecord,
) -> mpsc::Sender<serde_json::Value> {
    let (tx, mut rx) = mpsc::channel::<serde_json::Value>(ASYNC_QUEUE_CAPACITY);
    let ingress = Arc::clone(&context.ingress);
    let username = device.username.clone();
    let device_id = device.device_id.clone();
    let handle = handle.clone();

    tokio::spawn(
        async move {
            while let Some(data) = rx.recv().await {
                if let Err(error) = ingress
                    .handle_async_message(&username, &device_id, data)
                    .await
                {
                    tracing::warn!(%error, "Async message rejected, closing connection");
                    handle.disconnect();
                    break;
                }
            }
        }
        .in_current_span(),
    );

    tx
}
