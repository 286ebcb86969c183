//! Core configuration and playback state types.
//!
//! [`Config`] carries the static, per-installation values (identity, broker,
//! CPU placement). [`PlaybackState`] is the runtime snapshot owned by the
//! playback driver.

use serde::{Deserialize, Serialize};

use crate::command::TopicMatching;
use crate::context::DeviceIdentity;
use crate::error::{NetradioError, NetradioResult};
use crate::protocol_constants::{
    DEFAULT_AUDIO_NICE, DEFAULT_BROKER_PORT, DEFAULT_DEVICE_NAME, DEFAULT_TOPIC_ROOT,
    DEFAULT_VOLUME, MAX_VOLUME,
};

/// Connection settings for the upstream message broker.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct BrokerConfig {
    /// Broker hostname or IP address.
    pub host: String,

    /// Broker TCP port.
    pub port: u16,

    /// Username for broker authentication (anonymous when `None`).
    pub username: Option<String>,

    /// Password for broker authentication.
    pub password: Option<String>,

    /// Session keep-alive interval (seconds).
    pub keep_alive_secs: u64,

    /// Upper bound for a single connect handshake (seconds).
    pub connect_timeout_secs: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_BROKER_PORT,
            username: None,
            password: None,
            keep_alive_secs: 15,
            connect_timeout_secs: 10,
        }
    }
}

/// Configuration for the netradio device.
///
/// All fields have sensible defaults.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    // Identity
    /// Device name; bus client id and last topic segment of the namespace.
    pub device_name: String,

    /// Topic root shared by all devices of an installation.
    pub topic_root: String,

    // Bus
    /// Broker connection settings.
    pub broker: BrokerConfig,

    /// How inbound topics are mapped to commands.
    pub topic_matching: TopicMatching,

    // Playback
    /// Volume applied once at startup (0-21).
    pub initial_volume: u8,

    // Scheduling
    /// CPU core for the audio pump context (unpinned when `None`).
    pub audio_core: Option<usize>,

    /// Nice level for the audio pump thread (-20..=19, 0 keeps normal priority).
    pub audio_nice: i32,

    /// CPU core for the control context (unpinned when `None`).
    pub control_core: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_name: DEFAULT_DEVICE_NAME.to_string(),
            topic_root: DEFAULT_TOPIC_ROOT.to_string(),
            broker: BrokerConfig::default(),
            topic_matching: TopicMatching::default(),
            initial_volume: DEFAULT_VOLUME,
            audio_core: Some(1),
            audio_nice: DEFAULT_AUDIO_NICE,
            control_core: Some(0),
        }
    }
}

impl Config {
    /// Validates the configuration values.
    pub fn validate(&self) -> NetradioResult<()> {
        if self.device_name.is_empty() {
            return Err(NetradioError::Configuration(
                "device_name must not be empty".to_string(),
            ));
        }
        if self.device_name.contains(['/', '+', '#']) {
            return Err(NetradioError::Configuration(format!(
                "device_name '{}' must not contain '/', '+' or '#'",
                self.device_name
            )));
        }
        if self.topic_root.is_empty() || self.topic_root.contains(['+', '#']) {
            return Err(NetradioError::Configuration(format!(
                "topic_root '{}' must be non-empty and free of wildcards",
                self.topic_root
            )));
        }
        if self.broker.host.is_empty() {
            return Err(NetradioError::Configuration(
                "broker.host must not be empty".to_string(),
            ));
        }
        if self.broker.keep_alive_secs == 0 {
            return Err(NetradioError::Configuration(
                "broker.keep_alive_secs must be >= 1".to_string(),
            ));
        }
        if self.broker.connect_timeout_secs == 0 {
            return Err(NetradioError::Configuration(
                "broker.connect_timeout_secs must be >= 1".to_string(),
            ));
        }
        if self.initial_volume > MAX_VOLUME {
            return Err(NetradioError::Configuration(format!(
                "initial_volume must be <= {}, got {}",
                MAX_VOLUME, self.initial_volume
            )));
        }
        if !(-20..=19).contains(&self.audio_nice) {
            return Err(NetradioError::Configuration(format!(
                "audio_nice must be within -20..=19, got {}",
                self.audio_nice
            )));
        }
        Ok(())
    }

    /// Builds the device identity described by this configuration.
    #[must_use]
    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity::new(&self.topic_root, &self.device_name)
    }
}

/// Transport mode of the playback engine as seen by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PlaybackMode {
    /// No stream is playing.
    #[default]
    Stopped,
    /// A stream is connected and producing audio.
    Running,
    /// A stream is connected but output is paused.
    Paused,
}

/// Snapshot of the playback driver's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaybackState {
    /// URL of the stream last connected successfully.
    pub url: Option<String>,
    /// Last volume handed to the engine.
    pub volume: u8,
    /// Current transport mode.
    pub mode: PlaybackMode,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            url: None,
            volume: DEFAULT_VOLUME,
            mode: PlaybackMode::Stopped,
        }
    }
}
