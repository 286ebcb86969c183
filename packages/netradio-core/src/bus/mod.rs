//! Message bus session abstraction.
//!
//! The connectivity supervisor drives a [`BusSession`] exclusively from the
//! control context. Components that only need to emit status (the playback
//! driver) receive a [`BusPublisher`] handle instead, so they can never
//! subscribe, poll or reconnect.
//!
//! # Module Structure
//!
//! - `mqtt` - MQTT 3.1.1 implementation on top of `rumqttc`

mod mqtt;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::context::{DeviceIdentity, Topics};
use crate::protocol_constants::LAST_WILL_MESSAGE;
use crate::state::BrokerConfig;

pub use mqtt::{MqttPublisher, MqttSession};

/// Errors that can occur during bus session operations.
#[derive(Debug, Error)]
pub enum BusError {
    /// The broker refused the session or the transport failed during connect.
    #[error("Session connect failed: {0}")]
    Connect(String),

    /// The connect handshake did not finish in time.
    #[error("Session connect timed out after {0:?}")]
    Timeout(Duration),

    /// Operation attempted while no session is established.
    #[error("Session is not connected")]
    NotConnected,

    /// The client rejected an outbound request (queue full, closed).
    #[error("Request rejected: {0}")]
    Request(String),

    /// An established session was lost.
    #[error("Connection lost: {0}")]
    Connection(String),
}

/// Convenient Result alias for bus operations.
pub type BusResult<T> = Result<T, BusError>;

/// A message delivered by the broker on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Topic the message was published on.
    pub topic: String,
    /// Raw payload bytes.
    pub payload: Bytes,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Message the broker publishes on our behalf after an unclean disconnect.
///
/// Always QoS 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastWill {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
}

/// Everything needed to (re)establish a session.
///
/// Built once at startup and reused unchanged for every connect attempt, so
/// the last-will registration is identical across reconnects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    /// Client id presented to the broker (the device name).
    pub client_id: String,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive: Duration,
    /// Upper bound for one connect handshake.
    pub connect_timeout: Duration,
    pub last_will: LastWill,
}

impl SessionParams {
    /// Derives session parameters from broker settings and device identity.
    pub fn new(broker: &BrokerConfig, identity: &DeviceIdentity, topics: &Topics) -> Self {
        Self {
            client_id: identity.name().to_string(),
            host: broker.host.clone(),
            port: broker.port,
            username: broker.username.clone(),
            password: broker.password.clone(),
            keep_alive: Duration::from_secs(broker.keep_alive_secs),
            connect_timeout: Duration::from_secs(broker.connect_timeout_secs),
            last_will: LastWill {
                topic: topics.availability().to_string(),
                payload: LAST_WILL_MESSAGE.to_string(),
                retain: true,
            },
        }
    }
}

/// Outbound-only handle onto the bus.
///
/// Publishing is a non-blocking enqueue; it fails with
/// [`BusError::NotConnected`] while no session is established.
pub trait BusPublisher: Send + Sync {
    /// Publishes `payload` on `topic` at QoS 0.
    fn publish(&self, topic: &str, payload: &[u8], retain: bool) -> BusResult<()>;
}

/// A broker session owned by the connectivity supervisor.
#[async_trait]
pub trait BusSession: Send {
    /// Attempts one session connect and waits for the handshake result.
    async fn connect(&mut self, params: &SessionParams) -> BusResult<()>;

    /// Returns `true` while the session is established.
    fn is_connected(&self) -> bool;

    /// Subscribes to `topic` at QoS 0.
    fn subscribe(&mut self, topic: &str) -> BusResult<()>;

    /// Services the session for a bounded time and returns the next inbound
    /// message, if one arrived.
    ///
    /// An error means the session was lost; [`is_connected`](Self::is_connected)
    /// reports `false` afterwards.
    async fn poll(&mut self) -> BusResult<Option<InboundMessage>>;

    /// Flushes queued requests and closes the session cleanly.
    async fn disconnect(&mut self);

    /// Returns a publisher bound to this session.
    fn publisher(&self) -> Arc<dyn BusPublisher>;
}
