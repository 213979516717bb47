use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{
    AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, TlsConfiguration, Transport,
};
use tokio::sync::oneshot;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use stagelink_hub::{payload, Channel, Endpoint, HubClient, HubError, Payload};

use crate::credentials::Credentials;

/// Reconnect backoff starts here and doubles per failed attempt.
const RECONNECT_BASE_DELAY: Duration = Duration::from_secs(1);
/// Backoff ceiling.
const RECONNECT_MAX_DELAY: Duration = Duration::from_secs(32);
/// Consecutive failed reconnect attempts before the driver gives up.
const RECONNECT_ATTEMPTS: u32 = 20;
/// Request queue depth. The engine requires a bound; this is far beyond
/// anything bridge traffic can accumulate while offline.
const OFFLINE_QUEUE_DEPTH: usize = 65_536;
/// Queued requests drain at 2 per second once reconnected.
const DRAIN_THROTTLE: Duration = Duration::from_millis(500);
/// Timeout for connect and disconnect.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Timeout for publish and subscribe operations.
const OPERATION_TIMEOUT: Duration = Duration::from_secs(5);

struct IotHandle {
    client: AsyncClient,
    cancel: CancellationToken,
}

/// Cloud transport client over MQTT.
///
/// Holds an endpoint, a credential pair, the CA file path (consumed
/// opaquely by the TLS layer), a unique client id, and optionally a peer
/// client from the local transport. Messages arriving on subscribed topics
/// are relayed to the peer with topic and raw payload unchanged; relay
/// failures are logged and never disturb the connection itself.
pub struct IotClient {
    endpoint: Endpoint,
    credentials: Credentials,
    ca_path: PathBuf,
    client_id: String,
    peer: Option<Arc<dyn HubClient>>,
    handle: Mutex<Option<IotHandle>>,
}

impl IotClient {
    pub fn new(
        endpoint: Endpoint,
        credentials: Credentials,
        ca_path: impl Into<PathBuf>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            endpoint,
            credentials,
            ca_path: ca_path.into(),
            client_id: client_id.into(),
            peer: None,
            handle: Mutex::new(None),
        }
    }

    /// Sets the local-transport peer that inbound messages are relayed to.
    pub fn with_peer(mut self, peer: Arc<dyn HubClient>) -> Self {
        self.peer = Some(peer);
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    fn engine(&self) -> Option<AsyncClient> {
        self.handle.lock().unwrap().as_ref().map(|h| h.client.clone())
    }

    fn options(&self, ca: Vec<u8>) -> MqttOptions {
        let mut options =
            MqttOptions::new(&self.client_id, self.endpoint.host(), self.endpoint.port());
        options.set_credentials(
            self.credentials.access_key(),
            self.credentials.secret_key(),
        );
        options.set_transport(Transport::Tls(TlsConfiguration::Simple {
            ca,
            alpn: None,
            client_auth: None,
        }));
        options.set_pending_throttle(DRAIN_THROTTLE);
        options
    }
}

#[async_trait]
impl HubClient for IotClient {
    async fn connect(&self) -> Result<(), HubError> {
        if self.handle.lock().unwrap().is_some() {
            return Err(HubError::connection("already connected"));
        }

        let ca = tokio::fs::read(&self.ca_path).await.map_err(|err| {
            HubError::connection(format!("cannot read CA file {:?}: {err}", self.ca_path))
        })?;

        let (client, eventloop) = AsyncClient::new(self.options(ca), OFFLINE_QUEUE_DEPTH);
        let cancel = CancellationToken::new();
        let (ready_tx, ready_rx) = oneshot::channel();

        tokio::spawn(drive(eventloop, self.peer.clone(), cancel.clone(), ready_tx));

        let connected = timeout(CONNECT_TIMEOUT, ready_rx).await;
        match connected {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(reason))) => {
                cancel.cancel();
                return Err(HubError::connection(reason));
            }
            // Driver dropped the channel without reporting.
            Ok(Err(_)) => {
                cancel.cancel();
                return Err(HubError::connection("connection driver exited"));
            }
            Err(_) => {
                cancel.cancel();
                return Err(HubError::connection(format!(
                    "no broker acknowledgement from {} within {CONNECT_TIMEOUT:?}",
                    self.endpoint
                )));
            }
        }

        let mut guard = self.handle.lock().unwrap();
        if guard.is_some() {
            cancel.cancel();
            return Err(HubError::connection("already connected"));
        }
        *guard = Some(IotHandle { client, cancel });
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), HubError> {
        let handle = self.handle.lock().unwrap().take();
        let Some(handle) = handle else {
            // Nothing was ever acquired; teardown is a no-op.
            return Ok(());
        };

        let sent = timeout(CONNECT_TIMEOUT, handle.client.disconnect()).await;
        handle.cancel.cancel();
        match sent {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(HubError::connection(format!("disconnect failed: {err}"))),
            Err(_) => Err(HubError::connection("disconnect timed out")),
        }
    }

    async fn publish(&self, channel: &str, payload: Payload) -> Result<(), HubError> {
        let client = self
            .engine()
            .ok_or_else(|| HubError::publish(channel, "not connected"))?;

        let text = match payload {
            Payload::Text(text) => text,
            Payload::Args(args) => payload::encode_args(&args)?,
        };

        timeout(
            OPERATION_TIMEOUT,
            client.publish(channel, QoS::AtLeastOnce, false, text),
        )
        .await
        .map_err(|_| HubError::publish(channel, "operation timed out"))?
        .map_err(|err| HubError::publish(channel, err))
    }

    async fn subscribe(&self, channels: &[Channel]) -> Result<(), HubError> {
        let client = match channels.first() {
            None => return Ok(()),
            Some(first) => self
                .engine()
                .ok_or_else(|| HubError::subscribe(first, "not connected"))?,
        };

        // Fail fast: the first failing channel aborts the rest.
        for channel in channels {
            timeout(
                OPERATION_TIMEOUT,
                client.subscribe(channel, QoS::AtLeastOnce),
            )
            .await
            .map_err(|_| HubError::subscribe(channel, "operation timed out"))?
            .map_err(|err| HubError::subscribe(channel, err))?;
        }
        Ok(())
    }
}

/// Event-loop driver. Owns reconnection: polling keeps the session alive,
/// poll errors trigger bounded-doubling backoff, and the attempt budget
/// puts a ceiling on a broker that never comes back.
async fn drive(
    mut eventloop: EventLoop,
    peer: Option<Arc<dyn HubClient>>,
    cancel: CancellationToken,
    ready: oneshot::Sender<Result<(), String>>,
) {
    let mut ready = Some(ready);
    let mut backoff = RECONNECT_BASE_DELAY;
    let mut failed_attempts = 0u32;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = eventloop.poll() => match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    log::info!("iot: connected");
                    backoff = RECONNECT_BASE_DELAY;
                    failed_attempts = 0;
                    if let Some(tx) = ready.take() {
                        let _ = tx.send(Ok(()));
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    forward_inbound(peer.as_deref(), &publish.topic, &publish.payload).await;
                }
                Ok(_) => {}
                Err(err) => {
                    failed_attempts += 1;
                    if failed_attempts > RECONNECT_ATTEMPTS {
                        log::error!("iot: giving up after {RECONNECT_ATTEMPTS} reconnect attempts: {err}");
                        if let Some(tx) = ready.take() {
                            let _ = tx.send(Err(err.to_string()));
                        }
                        break;
                    }
                    log::warn!("iot: connection error ({err}), retrying in {backoff:?}");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    backoff = bounded_backoff_next(backoff, RECONNECT_MAX_DELAY);
                }
            }
        }
    }
    log::info!("iot: driver stopped");
}

/// Relays one inbound message to the peer, topic and raw payload unchanged.
/// Failures cost only this message; the engine's dispatch context never
/// sees them.
async fn forward_inbound(peer: Option<&dyn HubClient>, channel: &str, raw: &[u8]) {
    let Some(peer) = peer else {
        log::debug!("iot: message on {channel}, no peer configured");
        return;
    };

    let text = match std::str::from_utf8(raw) {
        Ok(text) => text.to_string(),
        Err(err) => {
            log::warn!("iot: malformed payload on {channel}: {err}");
            return;
        }
    };

    log::trace!("iot: rx << {channel} ({} bytes)", text.len());
    if let Err(err) = peer.publish(channel, Payload::Text(text)).await {
        log::warn!("iot: forwarding on {channel} failed: {err}");
    }
}

fn bounded_backoff_next(current: Duration, max: Duration) -> Duration {
    let current_ms = current.as_millis() as u64;
    let max_ms = max.as_millis() as u64;
    Duration::from_millis(current_ms.saturating_mul(2).min(max_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingPeer {
        published: Mutex<Vec<(String, Payload)>>,
        fail: bool,
    }

    impl RecordingPeer {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                published: Mutex::new(Vec::new()),
                fail,
            })
        }

        fn published(&self) -> Vec<(String, Payload)> {
            self.published.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HubClient for RecordingPeer {
        async fn connect(&self) -> Result<(), HubError> {
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), HubError> {
            Ok(())
        }

        async fn publish(&self, channel: &str, payload: Payload) -> Result<(), HubError> {
            if self.fail {
                return Err(HubError::publish(channel, "peer down"));
            }
            self.published
                .lock()
                .unwrap()
                .push((channel.to_string(), payload));
            Ok(())
        }

        async fn subscribe(&self, _channels: &[Channel]) -> Result<(), HubError> {
            Ok(())
        }
    }

    fn unconnected_client() -> IotClient {
        IotClient::new(
            Endpoint::new("iot.example.com", 8883),
            Credentials::new("key", "secret"),
            "/tmp/root-ca.pem",
            "bridge-test",
        )
    }

    #[tokio::test]
    async fn inbound_message_forwards_raw_text_exactly_once() {
        let peer = RecordingPeer::new(false);
        let raw = br#"{"action":"reset"}"#;

        forward_inbound(Some(&*peer), "cmd/reset", raw).await;

        let published = peer.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "cmd/reset");
        assert_eq!(
            published[0].1,
            Payload::Text(r#"{"action":"reset"}"#.to_string())
        );
    }

    #[tokio::test]
    async fn inbound_message_without_peer_is_a_no_op() {
        forward_inbound(None, "cmd/reset", b"[1]").await;
    }

    #[tokio::test]
    async fn peer_failure_is_isolated() {
        let peer = RecordingPeer::new(true);
        forward_inbound(Some(&*peer), "cmd/reset", b"[1]").await;
        assert!(peer.published().is_empty());
    }

    #[tokio::test]
    async fn non_utf8_payload_is_dropped_not_forwarded() {
        let peer = RecordingPeer::new(false);
        forward_inbound(Some(&*peer), "cmd/reset", &[0xFF, 0xFE]).await;
        assert!(peer.published().is_empty());
    }

    #[tokio::test]
    async fn publish_before_connect_is_a_publish_error() {
        let client = unconnected_client();
        let err = client
            .publish("cmd/reset", Payload::text("[1]"))
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::Publish { .. }));
    }

    #[tokio::test]
    async fn subscribe_before_connect_names_the_first_channel() {
        let client = unconnected_client();
        let channels = vec!["cmd/reset".to_string(), "cmd/update".to_string()];
        let err = client.subscribe(&channels).await.unwrap_err();
        assert_eq!(
            err,
            HubError::subscribe("cmd/reset", "not connected")
        );
    }

    #[tokio::test]
    async fn subscribe_to_nothing_succeeds_without_a_connection() {
        let client = unconnected_client();
        assert!(client.subscribe(&[]).await.is_ok());
    }

    #[tokio::test]
    async fn disconnect_without_connect_is_idempotent() {
        let client = unconnected_client();
        assert!(client.disconnect().await.is_ok());
        assert!(client.disconnect().await.is_ok());
    }

    #[tokio::test]
    async fn connect_fails_when_ca_file_is_missing() {
        let client = IotClient::new(
            Endpoint::new("iot.example.com", 8883),
            Credentials::new("key", "secret"),
            "/nonexistent/root-ca.pem",
            "bridge-test",
        );
        let err = client.connect().await.unwrap_err();
        assert!(matches!(err, HubError::Connection { .. }));
        // A failed connect leaves no handle behind.
        assert!(client.disconnect().await.is_ok());
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let mut backoff = RECONNECT_BASE_DELAY;
        let mut seen = Vec::new();
        for _ in 0..7 {
            seen.push(backoff.as_secs());
            backoff = bounded_backoff_next(backoff, RECONNECT_MAX_DELAY);
        }
        assert_eq!(seen, vec![1, 2, 4, 8, 16, 32, 32]);
    }
}
