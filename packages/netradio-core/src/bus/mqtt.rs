//! MQTT 3.1.1 bus session built on `rumqttc`.
//!
//! A fresh client/event-loop pair is created for every connect attempt, so
//! each attempt presents the same client id, credentials and last-will. The
//! event loop is only polled from the control context; publishers share the
//! client through a slot that is emptied whenever the session drops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use rumqttc::{
    AsyncClient, Event, EventLoop, LastWill as MqttLastWill, MqttOptions, Packet, QoS,
};

use super::{BusError, BusPublisher, BusResult, BusSession, InboundMessage, SessionParams};
use crate::protocol_constants::{BUS_POLL_TIMEOUT, BUS_REQUEST_CAPACITY};

/// How long a clean disconnect may spend flushing queued requests.
const DISCONNECT_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

type ClientSlot = Arc<RwLock<Option<AsyncClient>>>;

/// Session against an MQTT broker.
pub struct MqttSession {
    client: ClientSlot,
    eventloop: Option<EventLoop>,
    connected: Arc<AtomicBool>,
}

impl MqttSession {
    /// Creates a disconnected session.
    pub fn new() -> Self {
        Self {
            client: Arc::new(RwLock::new(None)),
            eventloop: None,
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    fn mark_disconnected(&mut self) {
        self.connected.store(false, Ordering::SeqCst);
        self.client.write().take();
        self.eventloop = None;
    }
}

impl Default for MqttSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds client options for one connect attempt.
fn mqtt_options(params: &SessionParams) -> MqttOptions {
    let mut options = MqttOptions::new(params.client_id.clone(), params.host.clone(), params.port);
    options.set_keep_alive(params.keep_alive);
    options.set_clean_session(true);
    options.set_last_will(MqttLastWill::new(
        params.last_will.topic.clone(),
        params.last_will.payload.clone().into_bytes(),
        QoS::AtMostOnce,
        params.last_will.retain,
    ));
    if let Some(username) = &params.username {
        options.set_credentials(
            username.clone(),
            params.password.clone().unwrap_or_default(),
        );
    }
    options
}

/// Creates the client/event-loop pair for one connect attempt.
///
/// The event loop's own network timeout (TCP connect plus CONNECT/ConnAck)
/// is aligned with the configured handshake bound.
fn new_client(params: &SessionParams) -> (AsyncClient, EventLoop) {
    let (client, mut eventloop) = AsyncClient::new(mqtt_options(params), BUS_REQUEST_CAPACITY);
    eventloop
        .network_options
        .set_connection_timeout(params.connect_timeout.as_secs().max(1));
    (client, eventloop)
}

/// Polls a fresh event loop until the broker acknowledges the connect.
async fn await_connack(eventloop: &mut EventLoop) -> BusResult<()> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => return Ok(()),
            Ok(_) => continue,
            Err(e) => return Err(BusError::Connect(e.to_string())),
        }
    }
}

#[async_trait]
impl BusSession for MqttSession {
    async fn connect(&mut self, params: &SessionParams) -> BusResult<()> {
        self.mark_disconnected();

        log::debug!(
            "[Mqtt] Connecting to {}:{} as '{}'",
            params.host,
            params.port,
            params.client_id
        );

        let (client, mut eventloop) = new_client(params);
        let outcome = tokio::time::timeout(params.connect_timeout, await_connack(&mut eventloop)).await;

        match outcome {
            Ok(Ok(())) => {
                *self.client.write() = Some(client);
                self.eventloop = Some(eventloop);
                self.connected.store(true, Ordering::SeqCst);
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(BusError::Timeout(params.connect_timeout)),
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn subscribe(&mut self, topic: &str) -> BusResult<()> {
        let guard = self.client.read();
        let client = guard.as_ref().ok_or(BusError::NotConnected)?;
        client
            .try_subscribe(topic, QoS::AtMostOnce)
            .map_err(|e| BusError::Request(e.to_string()))
    }

    async fn poll(&mut self) -> BusResult<Option<InboundMessage>> {
        let Some(eventloop) = self.eventloop.as_mut() else {
            return Ok(None);
        };

        let event = match tokio::time::timeout(BUS_POLL_TIMEOUT, eventloop.poll()).await {
            Ok(event) => event,
            Err(_) => return Ok(None),
        };

        match event {
            Ok(Event::Incoming(Packet::Publish(publish))) => Ok(Some(InboundMessage {
                topic: publish.topic,
                payload: publish.payload,
            })),
            Ok(Event::Incoming(Packet::Disconnect)) => {
                self.mark_disconnected();
                Err(BusError::Connection("broker sent DISCONNECT".to_string()))
            }
            Ok(_) => Ok(None),
            Err(e) => {
                self.mark_disconnected();
                Err(BusError::Connection(e.to_string()))
            }
        }
    }

    async fn disconnect(&mut self) {
        let client = self.client.read().clone();
        if let Some(client) = client {
            if let Err(e) = client.try_disconnect() {
                log::warn!("[Mqtt] Failed to queue DISCONNECT: {}", e);
            }
        }

        if let Some(mut eventloop) = self.eventloop.take() {
            // The event loop errors out once the DISCONNECT has been written.
            let flush = async {
                while eventloop.poll().await.is_ok() {}
            };
            if tokio::time::timeout(DISCONNECT_FLUSH_TIMEOUT, flush).await.is_err() {
                log::warn!("[Mqtt] Timed out flushing session before disconnect");
            }
        }

        self.mark_disconnected();
    }

    fn publisher(&self) -> Arc<dyn BusPublisher> {
        Arc::new(MqttPublisher {
            client: Arc::clone(&self.client),
            connected: Arc::clone(&self.connected),
        })
    }
}

/// Publisher handle sharing the session's current client.
#[derive(Clone)]
pub struct MqttPublisher {
    client: ClientSlot,
    connected: Arc<AtomicBool>,
}

impl BusPublisher for MqttPublisher {
    fn publish(&self, topic: &str, payload: &[u8], retain: bool) -> BusResult<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(BusError::NotConnected);
        }
        let guard = self.client.read();
        let client = guard.as_ref().ok_or(BusError::NotConnected)?;
        client
            .try_publish(topic, QoS::AtMostOnce, retain, payload.to_vec())
            .map_err(|e| BusError::Request(e.to_string()))
    }
}
