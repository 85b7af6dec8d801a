//! # Transport Connection Manager
//!
//! Owns the MQTT client lifecycle: connect, subscribe, automatic reconnect,
//! and deterministic teardown.
//!
//! Connection status transitions are surfaced through a `watch` channel;
//! transport errors are never thrown to callers. Reconnection uses a fixed
//! backoff with infinite retry: deliberate for a long-running monitoring
//! session, at the cost of silent retry forever (no max backoff or circuit
//! breaker).
//!
//! Incoming publishes are decoded and handed to the ingestion queue
//! without blocking the event loop.

pub mod credentials;
pub mod status;

use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, SubscribeFilter};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::MqttConfig;
use crate::telemetry::decoder::decode;
use crate::telemetry::ingest::IngestHandle;

pub use credentials::{CredentialStore, MemoryCredentialStore};
pub use status::{ConnectionState, TransportEvent};

/// Generate the unique client identifier for one connection attempt series.
fn unique_client_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

/// Apply a transport event to the shared status, logging the transition.
fn transition(status: &watch::Sender<ConnectionState>, event: TransportEvent) {
    status.send_if_modified(|state| {
        let next = state.apply(&event);
        if next == *state {
            return false;
        }
        info!("connection {:?} -> {:?} on {:?}", state, next, event);
        *state = next;
        true
    });
}

/// Active MQTT connection to the RadScope broker.
///
/// Serves exactly one logical topic stream for one device at a time; the
/// session is clean (no resumption across reconnects) and delivery order is
/// trusted as-is.
pub struct MqttConnection {
    client: AsyncClient,
    client_id: String,
    status: watch::Receiver<ConnectionState>,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl MqttConnection {
    /// Establish a connection and subscribe to the device wildcard topic
    /// and the fixed demo topic.
    ///
    /// Returns immediately; connection progress, including every failure,
    /// is reported through [`MqttConnection::status`] rather than as an
    /// error. Decoded readings are delivered to `readings`.
    pub fn connect(config: &MqttConfig, readings: IngestHandle) -> Self {
        Self::connect_with_credentials(config, None, readings)
    }

    /// Like [`MqttConnection::connect`], authenticating with the broker
    /// credential pair from the secure store when one is present.
    pub fn connect_with_credentials(
        config: &MqttConfig,
        store: Option<&dyn credentials::CredentialStore>,
        readings: IngestHandle,
    ) -> Self {
        let client_id = unique_client_id(&config.client_id_prefix);
        let mut options = MqttOptions::new(client_id.clone(), config.host.clone(), config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
        options.set_clean_session(true);

        if let Some(store) = store {
            match credentials::broker_credentials(store) {
                Ok(Some((username, password))) => {
                    options.set_credentials(username, password);
                }
                Ok(None) => debug!("no broker credentials stored, connecting anonymously"),
                Err(e) => warn!("credential store unavailable, connecting anonymously: {}", e),
            }
        }

        let (client, eventloop) = AsyncClient::new(options, 64);
        let (status_tx, status_rx) = watch::channel(ConnectionState::Disconnected);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        transition(&status_tx, TransportEvent::Dial);
        info!(
            "connecting to mqtt://{}:{} as {}",
            config.host, config.port, client_id
        );

        let worker = EventLoopWorker {
            client: client.clone(),
            topics: vec![config.device_topic.clone(), config.demo_topic.clone()],
            status: status_tx,
            readings,
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            reconnect_delay: Duration::from_millis(config.reconnect_interval_ms),
        };
        let task = tokio::spawn(worker.run(eventloop, shutdown_rx));

        Self {
            client,
            client_id,
            status: status_rx,
            shutdown: shutdown_tx,
            task: Some(task),
        }
    }

    /// The generated unique client identifier.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Connection-status observable.
    pub fn status(&self) -> watch::Receiver<ConnectionState> {
        self.status.clone()
    }

    /// Whether telemetry is currently flowing.
    pub fn is_connected(&self) -> bool {
        self.status.borrow().is_connected()
    }

    /// Tear down deterministically. Idempotent: a second call is a no-op.
    pub async fn disconnect(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        let _ = self.shutdown.send(true);
        // Best effort: the broker may already be gone
        let _ = self.client.disconnect().await;
        let _ = task.await;
        info!("mqtt connection {} torn down", self.client_id);
    }
}

struct EventLoopWorker {
    client: AsyncClient,
    topics: Vec<String>,
    status: watch::Sender<ConnectionState>,
    readings: IngestHandle,
    connect_timeout: Duration,
    reconnect_delay: Duration,
}

impl EventLoopWorker {
    /// Drive the MQTT event loop until shutdown. All transport errors feed
    /// the status state machine; the loop itself never fails.
    async fn run(self, mut eventloop: EventLoop, mut shutdown: watch::Receiver<bool>) {
        loop {
            let connected = self.status.borrow().is_connected();

            tokio::select! {
                _ = shutdown.changed() => {
                    transition(&self.status, TransportEvent::Teardown);
                    return;
                }
                event = Self::poll(&mut eventloop, connected, self.connect_timeout) => {
                    if !self.handle(event).await {
                        // Transport hiccup: fixed backoff, infinite retry
                        sleep(self.reconnect_delay).await;
                    }
                }
            }
        }
    }

    /// Poll the event loop, bounding the wait by the connect timeout while
    /// a connection is still being established.
    async fn poll(
        eventloop: &mut EventLoop,
        connected: bool,
        connect_timeout: Duration,
    ) -> Result<Event, String> {
        if connected {
            eventloop.poll().await.map_err(|e| e.to_string())
        } else {
            match timeout(connect_timeout, eventloop.poll()).await {
                Ok(result) => result.map_err(|e| e.to_string()),
                Err(_) => Err(format!("connect timed out after {:?}", connect_timeout)),
            }
        }
    }

    /// Handle one polled event. Returns `false` when the caller should back
    /// off before polling again.
    async fn handle(&self, event: Result<Event, String>) -> bool {
        match event {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                transition(&self.status, TransportEvent::ConnAck);
                let filters: Vec<SubscribeFilter> = self
                    .topics
                    .iter()
                    .map(|t| SubscribeFilter::new(t.clone(), QoS::AtMostOnce))
                    .collect();
                if let Err(e) = self.client.subscribe_many(filters).await {
                    transition(&self.status, TransportEvent::SubFail(e.to_string()));
                }
                true
            }
            Ok(Event::Incoming(Packet::SubAck(_))) => {
                transition(&self.status, TransportEvent::SubAck);
                true
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                // Decode is total; a malformed payload becomes the sentinel
                // reading and the stream continues.
                self.readings.enqueue(decode(&publish.payload));
                true
            }
            Ok(other) => {
                debug!("ignoring transport event: {:?}", other);
                true
            }
            Err(message) => {
                warn!("transport error: {}", message);
                transition(&self.status, TransportEvent::ConnectionLost(message));
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::ingest::ingest_channel;
    use crate::telemetry::state::telemetry_state;

    #[test]
    fn test_client_ids_are_unique() {
        let a = unique_client_id("radscope");
        let b = unique_client_id("radscope");
        assert!(a.starts_with("radscope-"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_transition_publishes_state_changes() {
        let (tx, rx) = watch::channel(ConnectionState::Disconnected);

        transition(&tx, TransportEvent::Dial);
        assert_eq!(*rx.borrow(), ConnectionState::Connecting);

        transition(&tx, TransportEvent::ConnAck);
        assert_eq!(*rx.borrow(), ConnectionState::Connecting);

        transition(&tx, TransportEvent::SubAck);
        assert_eq!(*rx.borrow(), ConnectionState::Connected);

        transition(&tx, TransportEvent::ConnectionLost("eof".into()));
        assert_eq!(*rx.borrow(), ConnectionState::Reconnecting);
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let config = MqttConfig::default();
        let (writer, _handle) = telemetry_state(10, 50);
        let (readings, _ingestor) = ingest_channel(writer);

        let mut connection = MqttConnection::connect(&config, readings);
        connection.disconnect().await;
        connection.disconnect().await;
        assert_eq!(*connection.status().borrow(), ConnectionState::Disconnected);
    }

    // Integration test - requires a local MQTT broker on 1883
    #[tokio::test]
    #[ignore] // Run with: cargo test -- --ignored
    async fn test_connect_with_real_broker() {
        let config = MqttConfig::default();
        let (writer, _handle) = telemetry_state(10, 50);
        let (readings, ingestor) = ingest_channel(writer);
        tokio::spawn(ingestor.run());

        let mut connection = MqttConnection::connect(&config, readings);
        let mut status = connection.status();
        tokio::time::timeout(Duration::from_secs(10), async {
            while !status.borrow_and_update().is_connected() {
                status.changed().await.unwrap();
            }
        })
        .await
        .expect("broker did not acknowledge subscription");

        connection.disconnect().await;
    }
}
