//! Connectivity supervisor: the control-context main loop.
//!
//! Responsibilities:
//! - Wait for link-layer connectivity before the first connect
//! - Keep the bus session alive with fixed-interval reconnects
//! - Re-subscribe and re-announce presence after every connect
//! - Pump inbound messages into the command dispatcher
//! - Service the update hook once per iteration
//! - Announce departure and close the session on shutdown

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::bus::{BusPublisher, BusSession, SessionParams};
use crate::command::CommandDispatcher;
use crate::context::{LinkMonitor, Topics};
use crate::error::ErrorCode;
use crate::lifecycle::UpdateService;
use crate::protocol_constants::{
    BIRTH_MESSAGE, LAST_WILL_MESSAGE, LINK_POLL_INTERVAL, RECONNECT_DELAY,
};

/// Session state as observed by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectivityState {
    /// No session; a reconnect is pending or backing off.
    #[default]
    Disconnected,
    /// A connect attempt is in flight.
    Connecting,
    /// Session established, subscriptions issued.
    Connected,
}

/// Owns the bus session and runs the control loop.
///
/// Every bus interaction happens here, on the control context. The audio
/// context never touches the session.
pub struct ConnectivitySupervisor {
    session: Box<dyn BusSession>,
    /// Publisher bound to `session`, used for presence messages.
    presence: Arc<dyn BusPublisher>,
    params: SessionParams,
    topics: Arc<Topics>,
    dispatcher: CommandDispatcher,
    updates: Box<dyn UpdateService>,
    link: Arc<dyn LinkMonitor>,
    state_tx: watch::Sender<ConnectivityState>,
    cancel_token: CancellationToken,
}

impl ConnectivitySupervisor {
    /// Creates a supervisor.
    ///
    /// # Arguments
    /// * `session` - Bus session; the supervisor is its only driver
    /// * `params` - Session parameters reused for every connect attempt
    /// * `topics` - Derived topic set
    /// * `dispatcher` - Receives every inbound message
    /// * `updates` - Hook serviced once per iteration
    /// * `link` - Link-layer monitor consulted before the first connect
    /// * `cancel_token` - Stops the loop when cancelled
    pub fn new(
        session: Box<dyn BusSession>,
        params: SessionParams,
        topics: Arc<Topics>,
        dispatcher: CommandDispatcher,
        updates: Box<dyn UpdateService>,
        link: Arc<dyn LinkMonitor>,
        cancel_token: CancellationToken,
    ) -> Self {
        let presence = session.publisher();
        let (state_tx, _) = watch::channel(ConnectivityState::Disconnected);
        Self {
            session,
            presence,
            params,
            topics,
            dispatcher,
            updates,
            link,
            state_tx,
            cancel_token,
        }
    }

    /// Returns a receiver that observes connectivity changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.state_tx.subscribe()
    }

    /// Returns the current connectivity state.
    pub fn state(&self) -> ConnectivityState {
        *self.state_tx.borrow()
    }

    /// Runs the control loop until the cancellation token fires.
    pub async fn run(mut self) {
        log::info!(
            "[Supervisor] Starting for broker {}:{}",
            self.params.host,
            self.params.port
        );

        if !self.wait_for_link().await {
            log::info!("[Supervisor] Cancelled before link came up");
            return;
        }

        while !self.cancel_token.is_cancelled() {
            self.iterate().await;
        }

        self.shutdown().await;
        log::info!("[Supervisor] Stopped");
    }

    /// Runs one control iteration: liveness check, pump, update hook.
    ///
    /// Blocks in the reconnect loop while the session is down, so the update
    /// hook is not serviced until the broker is reachable again.
    pub async fn iterate(&mut self) {
        if !self.session.is_connected() {
            if self.state() == ConnectivityState::Connected {
                log::warn!("[Supervisor] Session lost");
                self.set_state(ConnectivityState::Disconnected);
            }
            if !self.reconnect().await {
                return;
            }
        }

        self.pump().await;
        self.updates.service();
    }

    /// Polls the link monitor until it reports up.
    ///
    /// Returns `false` if cancelled first.
    async fn wait_for_link(&mut self) -> bool {
        if self.link.is_up() {
            return true;
        }

        log::info!("[Supervisor] Waiting for network link");
        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => return false,
                _ = tokio::time::sleep(LINK_POLL_INTERVAL) => {}
            }
            if self.link.is_up() {
                log::info!("[Supervisor] Network link is up");
                return true;
            }
        }
    }

    /// Attempts connects every [`RECONNECT_DELAY`] until one succeeds.
    ///
    /// Returns `false` if cancelled first.
    async fn reconnect(&mut self) -> bool {
        let mut attempt: u64 = 0;
        loop {
            attempt += 1;
            self.set_state(ConnectivityState::Connecting);
            log::info!(
                "[Supervisor] Connecting to {}:{} (attempt {})",
                self.params.host,
                self.params.port,
                attempt
            );

            let outcome = tokio::select! {
                _ = self.cancel_token.cancelled() => return false,
                outcome = self.session.connect(&self.params) => outcome,
            };

            match outcome {
                Ok(()) => {
                    log::info!("[Supervisor] Connected as '{}'", self.params.client_id);
                    self.set_state(ConnectivityState::Connected);
                    self.announce();
                    return true;
                }
                Err(e) => {
                    self.set_state(ConnectivityState::Disconnected);
                    log::warn!(
                        "[Supervisor] Connect failed [{}]: {}, retrying in {:?}",
                        e.code(),
                        e,
                        RECONNECT_DELAY
                    );
                    tokio::select! {
                        _ = self.cancel_token.cancelled() => return false,
                        _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                    }
                }
            }
        }
    }

    /// Subscribes every command topic and publishes the birth message.
    fn announce(&mut self) {
        for topic in self.topics.command_topics() {
            match self.session.subscribe(topic) {
                Ok(()) => log::debug!("[Supervisor] Subscribed to {}", topic),
                Err(e) => log::warn!(
                    "[Supervisor] Failed to subscribe to {} [{}]: {}",
                    topic,
                    e.code(),
                    e
                ),
            }
        }

        self.publish_presence(BIRTH_MESSAGE);
    }

    fn publish_presence(&self, payload: &str) {
        let topic = self.topics.availability();
        if let Err(e) = self.presence.publish(topic, payload.as_bytes(), true) {
            log::warn!(
                "[Supervisor] Failed to publish '{}' to {} [{}]: {}",
                payload,
                topic,
                e.code(),
                e
            );
        }
    }

    /// Services the session once and dispatches at most one inbound message.
    ///
    /// Returns `true` if a message was handled. Messages are never batched so
    /// the update hook runs between any two of them.
    async fn pump(&mut self) -> bool {
        if !self.session.is_connected() || self.cancel_token.is_cancelled() {
            return false;
        }

        match self.session.poll().await {
            Ok(Some(message)) => {
                self.dispatcher
                    .dispatch(&message.topic, &message.payload)
                    .await;
                true
            }
            Ok(None) => false,
            Err(e) => {
                log::warn!("[Supervisor] Session lost [{}]: {}", e.code(), e);
                self.set_state(ConnectivityState::Disconnected);
                false
            }
        }
    }

    /// Announces departure and closes the session.
    async fn shutdown(&mut self) {
        if self.session.is_connected() {
            self.publish_presence(LAST_WILL_MESSAGE);
            self.session.disconnect().await;
        }
        self.set_state(ConnectivityState::Disconnected);
    }

    fn set_state(&self, state: ConnectivityState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            log::debug!("[Supervisor] {:?} -> {:?}", previous, state);
        }
    }
}
