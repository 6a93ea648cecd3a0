//! Integration tests for the tunnel server.
//!
//! Most tests drive the warp filter in-process with `warp::test::ws()`; the last
//! ones bind a real listener and connect with a tokio-tungstenite client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tunnel::{
    AsyncHandlerError, AsyncMessageHandler, ConnectionRegistry, DeviceId, InMemoryDeviceDirectory,
    TunnelConfig, TunnelError,
};
use tunnel_server::{Credentials, ServerConfig, TunnelServer};
use warp::test::WsClient;

/// Forwards every async message to a channel; rejects messages that carry
/// `"reject": true` and waits `delayMs` before forwarding when given.
struct RecordingHandler {
    tx: mpsc::UnboundedSender<(String, DeviceId, Value)>,
}

#[async_trait]
impl AsyncMessageHandler for RecordingHandler {
    async fn handle_async_message(
        &self,
        username: &str,
        device_id: &DeviceId,
        message: Value,
    ) -> Result<(), AsyncHandlerError> {
        if message["reject"] == json!(true) {
            return Err(AsyncHandlerError::MalformedMessage("rejected".to_string()));
        }
        if let Some(delay) = message["delayMs"].as_u64() {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        let _ = self
            .tx
            .send((username.to_string(), device_id.clone(), message));
        Ok(())
    }
}

struct Harness {
    registry: Arc<ConnectionRegistry>,
    async_rx: mpsc::UnboundedReceiver<(String, DeviceId, Value)>,
    directory: Arc<InMemoryDeviceDirectory>,
    handler: Arc<RecordingHandler>,
}

impl Harness {
    fn new() -> Self {
        let directory = InMemoryDeviceDirectory::new();
        directory.add_device("alice", "s3cret", "dev-1");
        directory.add_device("bob", "hunter2", "dev-2");
        let (tx, async_rx) = mpsc::unbounded_channel();
        Self {
            registry: Arc::new(ConnectionRegistry::new()),
            async_rx,
            directory: Arc::new(directory),
            handler: Arc::new(RecordingHandler { tx }),
        }
    }

    fn routes(
        &self,
        config: &ServerConfig,
    ) -> impl warp::Filter<Extract = (impl warp::Reply,), Error = std::convert::Infallible>
           + Clone
           + Send
           + Sync
           + 'static {
        TunnelServer::routes(
            config,
            Arc::clone(&self.registry),
            self.directory.clone(),
            self.handler.clone(),
        )
        .unwrap()
    }

    async fn connect(&self, config: &ServerConfig, username: &str, secret: &str) -> WsClient {
        warp::test::ws()
            .path("/ws")
            .header(
                "authorization",
                Credentials::new(username, secret).to_header_value(),
            )
            .header("addonversion", "0.4.1")
            .handshake(self.routes(config))
            .await
            .expect("handshake")
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

async fn recv_json(client: &mut WsClient) -> Value {
    let message = timeout(Duration::from_secs(2), client.recv())
        .await
        .expect("no frame in time")
        .expect("connection closed");
    serde_json::from_str(message.to_str().expect("text frame")).expect("json frame")
}

#[tokio::test]
async fn test_handshake_without_credentials_is_unauthorized() {
    let harness = Harness::new();
    let routes = harness.routes(&ServerConfig::default());

    let response = warp::test::request().path("/ws").reply(&routes).await;
    assert_eq!(response.status(), 401);

    let response = warp::test::request()
        .path("/ws")
        .header("authorization", "Basic not-base64!")
        .reply(&routes)
        .await;
    assert_eq!(response.status(), 401);
    assert!(harness.registry.is_empty());
}

#[tokio::test]
async fn test_handshake_with_unknown_credentials_is_unauthorized() {
    let harness = Harness::new();

    let result = warp::test::ws()
        .path("/ws")
        .header(
            "authorization",
            Credentials::new("alice", "wrong").to_header_value(),
        )
        .handshake(harness.routes(&ServerConfig::default()))
        .await;

    assert!(result.is_err());
    assert!(harness.registry.is_empty());
}

#[tokio::test]
async fn test_health_route_reports_connected_devices() {
    let harness = Harness::new();
    let config = ServerConfig::default();
    let _client = harness.connect(&config, "alice", "s3cret").await;
    wait_until(|| harness.registry.len() == 1).await;

    let response = warp::test::request()
        .path("/health")
        .reply(&harness.routes(&config))
        .await;

    assert_eq!(response.status(), 200);
    let body: Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body, json!({"status": "ok", "connectedDevices": 1}));
}

#[tokio::test]
async fn test_unknown_path_is_not_found() {
    let harness = Harness::new();
    let response = warp::test::request()
        .path("/nope")
        .reply(&harness.routes(&ServerConfig::default()))
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_set_volume_round_trip() {
    let harness = Harness::new();
    let mut client = harness
        .connect(&ServerConfig::default(), "alice", "s3cret")
        .await;
    wait_until(|| harness.registry.is_connected(&DeviceId::new("dev-1"))).await;

    let record = harness.registry.lookup(&DeviceId::new("dev-1")).unwrap();
    assert_eq!(record.username, "alice");
    assert_eq!(record.addon_version.as_deref(), Some("0.4.1"));

    let call = tokio::spawn(async move {
        record
            .transmit(json!({"type": "command", "commandType": "setVolume", "volume": 50}))
            .await
    });

    let frame = recv_json(&mut client).await;
    assert_eq!(
        frame["data"],
        json!({"type": "command", "commandType": "setVolume", "volume": 50})
    );
    let correlation_id = frame["correlationId"].as_str().unwrap().to_string();

    client
        .send_text(
            json!({
                "correlationId": correlation_id,
                "data": {"state": [{"name": "volume", "value": 50}]},
            })
            .to_string(),
        )
        .await;

    let response = call.await.unwrap().unwrap();
    assert_eq!(response, json!({"state": [{"name": "volume", "value": 50}]}));
}

#[tokio::test]
async fn test_duplicate_identity_is_closed_and_incumbent_survives() {
    let harness = Harness::new();
    let config = ServerConfig::default();
    let mut incumbent = harness.connect(&config, "alice", "s3cret").await;
    wait_until(|| harness.registry.is_connected(&DeviceId::new("dev-1"))).await;

    let record = harness.registry.lookup(&DeviceId::new("dev-1")).unwrap();
    let incumbent_id = record.connection_id;
    let call = tokio::spawn(async move { record.transmit(json!({"type": "state"})).await });
    let frame = recv_json(&mut incumbent).await;

    let mut newcomer = harness.connect(&config, "alice", "s3cret").await;
    timeout(Duration::from_secs(2), newcomer.recv_closed())
        .await
        .expect("newcomer was not closed")
        .expect("expected a close frame");

    assert_eq!(
        harness
            .registry
            .lookup(&DeviceId::new("dev-1"))
            .unwrap()
            .connection_id,
        incumbent_id
    );

    incumbent
        .send_text(json!({"correlationId": frame["correlationId"], "data": {"state": []}}).to_string())
        .await;
    assert_eq!(call.await.unwrap().unwrap(), json!({"state": []}));
}

#[tokio::test]
async fn test_unmatched_response_closes_connection() {
    let harness = Harness::new();
    let mut client = harness
        .connect(&ServerConfig::default(), "alice", "s3cret")
        .await;
    wait_until(|| harness.registry.is_connected(&DeviceId::new("dev-1"))).await;

    client
        .send_text(json!({"correlationId": "nobody-asked", "data": {}}).to_string())
        .await;

    wait_until(|| !harness.registry.is_connected(&DeviceId::new("dev-1"))).await;
    timeout(Duration::from_secs(2), client.recv_closed())
        .await
        .expect("connection not closed")
        .expect("expected a close frame");
}

#[tokio::test]
async fn test_malformed_frame_closes_connection() {
    let harness = Harness::new();
    let mut client = harness
        .connect(&ServerConfig::default(), "alice", "s3cret")
        .await;
    wait_until(|| harness.registry.is_connected(&DeviceId::new("dev-1"))).await;

    client.send_text("this is not json").await;

    wait_until(|| !harness.registry.is_connected(&DeviceId::new("dev-1"))).await;
}

#[tokio::test]
async fn test_heartbeat_keeps_connection_open() {
    let harness = Harness::new();
    let mut client = harness
        .connect(&ServerConfig::default(), "alice", "s3cret")
        .await;
    wait_until(|| harness.registry.is_connected(&DeviceId::new("dev-1"))).await;

    client.send_text(json!({"ping": "pong"}).to_string()).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(harness.registry.is_connected(&DeviceId::new("dev-1")));
}

#[tokio::test]
async fn test_async_message_reaches_handler() {
    let mut harness = Harness::new();
    let mut client = harness
        .connect(&ServerConfig::default(), "alice", "s3cret")
        .await;
    wait_until(|| harness.registry.is_connected(&DeviceId::new("dev-1"))).await;

    let data = json!({
        "type": "change_state",
        "changed": "volume",
        "state": [{"name": "volume", "value": 30}],
        "addon_change": false,
    });
    client
        .send_text(json!({"async": true, "data": data}).to_string())
        .await;

    let (username, device_id, message) = timeout(Duration::from_secs(2), harness.async_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(username, "alice");
    assert_eq!(device_id, DeviceId::new("dev-1"));
    assert_eq!(message, data);
    assert!(harness.registry.is_connected(&DeviceId::new("dev-1")));
}

#[tokio::test]
async fn test_async_messages_are_handled_in_arrival_order() {
    let mut harness = Harness::new();
    let mut client = harness
        .connect(&ServerConfig::default(), "alice", "s3cret")
        .await;
    wait_until(|| harness.registry.is_connected(&DeviceId::new("dev-1"))).await;

    // The first event is slow to handle; the second must still come after it.
    for data in [json!({"seq": 1, "delayMs": 100}), json!({"seq": 2})] {
        client
            .send_text(json!({"async": true, "data": data}).to_string())
            .await;
    }

    for expected in [1, 2] {
        let (_, _, message) = timeout(Duration::from_secs(2), harness.async_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(message["seq"], json!(expected));
    }
}

#[tokio::test]
async fn test_reply_to_abandoned_call_keeps_connection_open() {
    let harness = Harness::new();
    let mut client = harness
        .connect(&ServerConfig::default(), "alice", "s3cret")
        .await;
    wait_until(|| harness.registry.is_connected(&DeviceId::new("dev-1"))).await;

    let record = harness.registry.lookup(&DeviceId::new("dev-1")).unwrap();
    let gave_up = timeout(Duration::from_millis(20), record.transmit(json!({"type": "state"}))).await;
    assert!(gave_up.is_err());

    let frame = recv_json(&mut client).await;
    client
        .send_text(json!({"correlationId": frame["correlationId"], "data": {"state": []}}).to_string())
        .await;
    client.send_text(json!({"ping": "pong"}).to_string()).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(harness.registry.is_connected(&DeviceId::new("dev-1")));
    assert_eq!(record.tunnel().pending_count(), 0);
}

#[tokio::test]
async fn test_rejected_async_message_closes_connection() {
    let harness = Harness::new();
    let mut client = harness
        .connect(&ServerConfig::default(), "alice", "s3cret")
        .await;
    wait_until(|| harness.registry.is_connected(&DeviceId::new("dev-1"))).await;

    client
        .send_text(json!({"async": true, "data": {"reject": true}}).to_string())
        .await;

    wait_until(|| !harness.registry.is_connected(&DeviceId::new("dev-1"))).await;
}

#[tokio::test]
async fn test_disconnect_fails_pending_calls() {
    let harness = Harness::new();
    let mut client = harness
        .connect(&ServerConfig::default(), "alice", "s3cret")
        .await;
    wait_until(|| harness.registry.is_connected(&DeviceId::new("dev-1"))).await;

    let record = harness.registry.lookup(&DeviceId::new("dev-1")).unwrap();
    let call = tokio::spawn(async move { record.transmit(json!({"type": "state"})).await });
    recv_json(&mut client).await;

    drop(client);

    let result = timeout(Duration::from_secs(2), call).await.unwrap().unwrap();
    assert!(matches!(result, Err(TunnelError::ConnectionClosed)));
    wait_until(|| !harness.registry.is_connected(&DeviceId::new("dev-1"))).await;
}

#[tokio::test]
async fn test_silent_connection_is_reclaimed() {
    let harness = Harness::new();
    let config = ServerConfig::default().with_tunnel(
        TunnelConfig::new().with_idle_timeout(Some(Duration::from_millis(200))),
    );
    let _client = harness.connect(&config, "alice", "s3cret").await;
    wait_until(|| harness.registry.is_connected(&DeviceId::new("dev-1"))).await;

    wait_until(|| !harness.registry.is_connected(&DeviceId::new("dev-1"))).await;

    // The identity is free again for a fresh connection.
    let _fresh = harness.connect(&config, "alice", "s3cret").await;
    wait_until(|| harness.registry.is_connected(&DeviceId::new("dev-1"))).await;
}

#[tokio::test]
async fn test_devices_are_isolated() {
    let harness = Harness::new();
    let config = ServerConfig::default();
    let mut alice = harness.connect(&config, "alice", "s3cret").await;
    let _bob = harness.connect(&config, "bob", "hunter2").await;
    wait_until(|| harness.registry.len() == 2).await;

    let record = harness.registry.lookup(&DeviceId::new("dev-1")).unwrap();
    let call = tokio::spawn(async move { record.transmit(json!({"type": "capabilities"})).await });

    let frame = recv_json(&mut alice).await;
    assert_eq!(frame["data"], json!({"type": "capabilities"}));
    alice
        .send_text(json!({"correlationId": frame["correlationId"], "data": {"capabilities": []}}).to_string())
        .await;

    assert_eq!(call.await.unwrap().unwrap(), json!({"capabilities": []}));
    assert!(harness.registry.is_connected(&DeviceId::new("dev-2")));
}

mod real_server {
    use super::*;
    use tokio_tungstenite::connect_async;
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;
    use tokio_tungstenite::tungstenite::http::HeaderValue;
    use tokio_tungstenite::tungstenite::Message;

    async fn start(harness: &Harness) -> TunnelServer {
        TunnelServer::bind(
            ServerConfig::local(),
            Arc::clone(&harness.registry),
            harness.directory.clone(),
            harness.handler.clone(),
        )
        .await
        .expect("Failed to start tunnel server")
    }

    fn request(
        url: &str,
        credentials: &Credentials,
    ) -> tokio_tungstenite::tungstenite::handshake::client::Request {
        let mut request = url.into_client_request().unwrap();
        request.headers_mut().insert(
            "Authorization",
            HeaderValue::from_str(&credentials.to_header_value()).unwrap(),
        );
        request
    }

    #[tokio::test]
    async fn test_device_round_trip_over_tcp() {
        let harness = Harness::new();
        let server = start(&harness).await;
        assert!(server.port() > 0);

        let (mut socket, response) = connect_async(request(
            &server.ws_url(),
            &Credentials::new("alice", "s3cret"),
        ))
        .await
        .expect("Failed to connect");
        assert_eq!(response.status(), 101);
        wait_until(|| harness.registry.is_connected(&DeviceId::new("dev-1"))).await;

        let record = harness.registry.lookup(&DeviceId::new("dev-1")).unwrap();
        let call = tokio::spawn(async move {
            record
                .transmit(json!({"type": "command", "commandType": "seek", "deltaPosition": 30}))
                .await
        });

        let frame = timeout(Duration::from_secs(2), socket.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let frame: Value = serde_json::from_str(frame.to_text().unwrap()).unwrap();
        socket
            .send(Message::text(
                json!({
                    "correlationId": frame["correlationId"],
                    "data": {"positionMilliseconds": 90_000},
                })
                .to_string(),
            ))
            .await
            .unwrap();

        assert_eq!(
            call.await.unwrap().unwrap(),
            json!({"positionMilliseconds": 90_000})
        );

        server.shutdown().await;
        wait_until(|| harness.registry.is_empty()).await;
    }

    #[tokio::test]
    async fn test_bad_credentials_over_tcp_get_401() {
        let harness = Harness::new();
        let server = start(&harness).await;

        let result = connect_async(request(
            &server.ws_url(),
            &Credentials::new("alice", "wrong"),
        ))
        .await;

        match result {
            Err(tokio_tungstenite::tungstenite::Error::Http(response)) => {
                assert_eq!(response.status(), 401);
            }
            Err(other) => panic!("expected HTTP 401, got {other}"),
            Ok(_) => panic!("handshake unexpectedly succeeded"),
        }

        server.shutdown().await;
    }
}
