//! Correlated RPC channel over a single device connection.
//!
//! A [`Tunnel`] turns a duplex text-frame stream into a call/response API. The
//! tunnel does not own the socket: outbound frames are pushed into a bounded
//! channel that the connection driver drains into the socket, and the driver
//! feeds every inbound text frame back through [`Tunnel::dispatch`].
//!
//! Each call gets a fresh [`CorrelationId`] and a pending record holding a
//! oneshot resolver. The record is removed exactly once: by the matching
//! response, by the call's deadline, or by [`Tunnel::close`]. Removal from the
//! map is the single-fire guard, so the deadline and the response path can race
//! without double resolution. The deadline covers queueing the frame as well as
//! waiting for the answer.
//!
//! A caller that drops its call future abandons the wait but not the record: a
//! matching response before the deadline is still accepted and discarded.
//! Abandoned records are purged once their deadline has passed.
//!
//! A timeout abandons the wait only. No cancellation is sent to the device, and
//! a response that arrives after the deadline no longer matches any record, which
//! the driver treats as a protocol violation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::envelope::{InboundFrame, OutboundEnvelope};
use crate::error::{ProtocolViolation, Result, TunnelError};
use crate::types::{CorrelationId, DeviceId};

/// Outcome of dispatching one inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// A heartbeat; nothing changed
    Heartbeat,
    /// The frame resolved the call with this correlation ID
    Resolved(CorrelationId),
    /// An unsolicited event for the async ingress
    Async(Value),
}

struct PendingCall {
    resolver: oneshot::Sender<Value>,
    deadline: Instant,
}

struct TunnelInner {
    device_id: DeviceId,
    outbound: mpsc::Sender<String>,
    pending: Mutex<HashMap<CorrelationId, PendingCall>>,
    rpc_timeout: Duration,
    closed: AtomicBool,
}

/// Request/response multiplexer for one device connection.
///
/// Cloning is cheap; all clones share the same pending-call table.
#[derive(Clone)]
pub struct Tunnel {
    inner: Arc<TunnelInner>,
}

impl std::fmt::Debug for Tunnel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tunnel")
            .field("device_id", &self.inner.device_id)
            .field("pending", &self.pending_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Tunnel {
    /// Create a tunnel writing its outbound frames into `outbound`.
    pub fn new(device_id: DeviceId, outbound: mpsc::Sender<String>, rpc_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(TunnelInner {
                device_id,
                outbound,
                pending: Mutex::new(HashMap::new()),
                rpc_timeout,
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Device this tunnel talks to.
    pub fn device_id(&self) -> &DeviceId {
        &self.inner.device_id
    }

    /// Deadline applied to every call.
    pub fn rpc_timeout(&self) -> Duration {
        self.inner.rpc_timeout
    }

    /// Issue a call and wait for the device's matching response.
    ///
    /// Resolves with the response's `data` member, or fails with
    /// [`TunnelError::Timeout`] once the RPC timeout elapses, or with
    /// [`TunnelError::ConnectionClosed`] if the connection goes away first.
    pub async fn call(&self, payload: Value) -> Result<Value> {
        let inner: &TunnelInner = &self.inner;
        if inner.closed.load(Ordering::Acquire) {
            return Err(TunnelError::ConnectionClosed);
        }

        let correlation_id = CorrelationId::generate();
        let frame = OutboundEnvelope::new(&correlation_id, &payload).encode()?;

        let (resolver, mut response) = oneshot::channel();
        let deadline = Instant::now() + inner.rpc_timeout;
        {
            let mut pending = inner.pending.lock();
            purge_abandoned(&mut pending, Instant::now());
            pending.insert(correlation_id.clone(), PendingCall { resolver, deadline });
        }

        // close() flips the flag before draining, so a call registered after the
        // drain still observes the flag here.
        if inner.closed.load(Ordering::Acquire) {
            inner.pending.lock().remove(&correlation_id);
            return Err(TunnelError::ConnectionClosed);
        }

        tracing::debug!(
            device_id = %inner.device_id,
            correlation_id = %correlation_id,
            "Sending RPC frame"
        );

        match tokio::time::timeout_at(deadline, inner.outbound.send(frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => {
                inner.pending.lock().remove(&correlation_id);
                return Err(TunnelError::ConnectionClosed);
            }
            Err(_) => {
                inner.pending.lock().remove(&correlation_id);
                tracing::warn!(
                    device_id = %inner.device_id,
                    correlation_id = %correlation_id,
                    timeout = ?inner.rpc_timeout,
                    "RPC frame could not be queued before the deadline"
                );
                return Err(TunnelError::Timeout {
                    correlation_id,
                    timeout: inner.rpc_timeout,
                });
            }
        }

        match tokio::time::timeout_at(deadline, &mut response).await {
            Ok(Ok(data)) => Ok(data),
            Ok(Err(_)) => Err(TunnelError::ConnectionClosed),
            Err(_) => {
                if inner.pending.lock().remove(&correlation_id).is_some() {
                    tracing::warn!(
                        device_id = %inner.device_id,
                        correlation_id = %correlation_id,
                        timeout = ?inner.rpc_timeout,
                        "RPC call timed out"
                    );
                    return Err(TunnelError::Timeout {
                        correlation_id,
                        timeout: inner.rpc_timeout,
                    });
                }
                // The response won the race for the record; its value is already
                // sitting in the oneshot.
                response.try_recv().map_err(|_| TunnelError::ConnectionClosed)
            }
        }
    }

    /// Route one inbound text frame.
    ///
    /// Responses resolve their pending call. Heartbeats and async events are
    /// returned to the caller; a [`ProtocolViolation`] means the connection
    /// must be closed.
    pub fn dispatch(&self, text: &str) -> std::result::Result<Dispatch, ProtocolViolation> {
        match InboundFrame::parse(text)? {
            InboundFrame::Heartbeat => Ok(Dispatch::Heartbeat),
            InboundFrame::Async { data } => Ok(Dispatch::Async(data)),
            InboundFrame::Response {
                correlation_id,
                data,
            } => {
                let now = Instant::now();
                let call = {
                    let mut pending = self.inner.pending.lock();
                    purge_abandoned(&mut pending, now);
                    pending.remove(&correlation_id)
                }
                .ok_or_else(|| ProtocolViolation::UnknownCorrelationId(correlation_id.clone()))?;

                let remaining = call.deadline.saturating_duration_since(now);
                tracing::debug!(
                    device_id = %self.inner.device_id,
                    correlation_id = %correlation_id,
                    remaining_ms = remaining.as_millis() as u64,
                    "Received RPC response"
                );

                // A closed resolver means the caller gave up; the response is
                // accepted and discarded.
                let _ = call.resolver.send(data);
                Ok(Dispatch::Resolved(correlation_id))
            }
        }
    }

    /// Mark the tunnel closed and fail every outstanding call.
    ///
    /// Returns the number of calls that were drained. Idempotent.
    pub fn close(&self) -> usize {
        self.inner.closed.store(true, Ordering::Release);
        let drained: Vec<PendingCall> = {
            let mut pending = self.inner.pending.lock();
            pending.drain().map(|(_, call)| call).collect()
        };
        let count = drained.len();
        // Dropping the resolvers wakes each waiting call with ConnectionClosed.
        drop(drained);

        if count > 0 {
            tracing::info!(
                device_id = %self.inner.device_id,
                count,
                "Drained pending RPC calls on close"
            );
        }
        count
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Number of calls currently awaiting a response.
    pub fn pending_count(&self) -> usize {
        let mut pending = self.inner.pending.lock();
        purge_abandoned(&mut pending, Instant::now());
        pending.len()
    }
}

/// Drop records whose caller has gone away and whose deadline has passed.
fn purge_abandoned(pending: &mut HashMap<CorrelationId, PendingCall>, now: Instant) {
    pending.retain(|_, call| !(call.resolver.is_closed() && call.deadline <= now));
}
