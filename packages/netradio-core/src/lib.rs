//! Netradio Core - controller library for a network-attached internet radio.
//!
//! The device plays internet audio streams and is remote-controlled through
//! a publish/subscribe message broker. It announces its presence, accepts
//! playback commands, reports the stream it is playing and reconnects on its
//! own whenever the broker becomes unreachable.
//!
//! # Architecture
//!
//! - [`scheduler`]: The two dedicated execution contexts (audio pump, control)
//! - [`supervisor`]: Control loop owning the bus session and its reconnects
//! - [`command`]: Topic matching, payload decoding and command dispatch
//! - [`playback`]: Audio engine abstraction and the playback driver
//! - [`bus`]: Bus session abstraction and the MQTT implementation
//! - [`context`]: Device identity, derived topics and link detection
//! - [`state`]: Configuration and playback state
//! - [`lifecycle`]: Restart and update hooks
//! - [`error`]: Centralized error types
//!
//! # Abstraction Traits
//!
//! - [`AudioEngine`](playback::AudioEngine): Stream decode and output
//! - [`BusSession`](bus::BusSession) / [`BusPublisher`](bus::BusPublisher): Broker access
//! - [`LinkMonitor`](context::LinkMonitor): Link-layer readiness
//! - [`Lifecycle`](lifecycle::Lifecycle): Restart and shutdown requests
//! - [`UpdateService`](lifecycle::UpdateService): Firmware update hook
//!
//! Each trait has a default implementation suitable for a standalone host.

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod bootstrap;
pub mod bus;
pub mod command;
pub mod context;
pub mod error;
pub mod lifecycle;
pub mod playback;
pub mod protocol_constants;
pub mod scheduler;
pub mod state;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod test_fixtures;

// Re-export commonly used types at the crate root
pub use bus::{BusError, BusPublisher, BusResult, BusSession, InboundMessage, MqttSession, SessionParams};
pub use command::{Command, CommandDispatcher, CommandKind, TopicMatching};
pub use context::{DeviceIdentity, LinkMonitor, LocalIpLink, NetworkError, Topics};
pub use error::{ErrorCode, NetradioError, NetradioResult};
pub use lifecycle::{DeviceLifecycle, Lifecycle, NoopUpdateService, UpdateService};
pub use playback::{AudioEngine, EngineActivity, HeadlessEngine, PlaybackDriver, SharedEngine};
pub use scheduler::{AudioPump, ControlRuntime};
pub use state::{BrokerConfig, Config, PlaybackMode, PlaybackState};
pub use supervisor::{ConnectivityState, ConnectivitySupervisor};

// Re-export bootstrap types
pub use bootstrap::{bootstrap_device, BootstrappedDevice, DeviceParts, RunningDevice};
